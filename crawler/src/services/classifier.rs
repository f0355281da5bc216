//! Decides whether a discovered channel belongs in the corpus.
//!
//! Decision order:
//! 1. a blacklisted id is always rejected (and its data is removed by the caller),
//! 2. the `ignore_sailing_term` override accepts,
//! 3. otherwise a domain term must appear in the title or description,
//! 4. an accepted channel that reports zero videos is still rejected.

use crate::error::CrawlResult;
use crate::models::NonDomainChannel;
use crate::services::store::CrawlStore;
use log::info;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Blacklisted,
    NoDomainTerm,
    KnownNonDomain,
    NoVideos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted { by_override: bool },
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted { .. })
    }
}

pub struct Candidate<'a> {
    pub channel_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub video_count: i64,
    pub ignore_sailing_term: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    domain_terms: Vec<String>,
    blacklist: HashSet<String>,
}

impl Classifier {
    pub fn new<T, B>(domain_terms: T, blacklist: B) -> Self
    where
        T: IntoIterator<Item = String>,
        B: IntoIterator<Item = String>,
    {
        Classifier {
            domain_terms: domain_terms
                .into_iter()
                .map(|term| term.to_lowercase())
                .filter(|term| !term.is_empty())
                .collect(),
            blacklist: blacklist.into_iter().collect(),
        }
    }

    /// Loads the term set and blacklist once per cycle.
    pub async fn load(store: &dyn CrawlStore) -> CrawlResult<Self> {
        let terms = store.domain_terms().await?;
        let blacklist = store.blacklist().await?;
        info!(
            "Loaded {} domain terms and {} blacklisted channels",
            terms.len(),
            blacklist.len()
        );
        Ok(Classifier::new(terms, blacklist))
    }

    pub fn is_blacklisted(&self, channel_id: &str) -> bool {
        self.blacklist.contains(channel_id)
    }

    pub fn has_domain_term(&self, title: &str, description: &str) -> bool {
        let title = title.to_lowercase();
        let description = description.to_lowercase();

        self.domain_terms
            .iter()
            .any(|term| title.contains(term.as_str()) || description.contains(term.as_str()))
    }

    pub fn classify(&self, candidate: &Candidate<'_>) -> Verdict {
        if self.is_blacklisted(candidate.channel_id) {
            return Verdict::Rejected(RejectReason::Blacklisted);
        }

        let verdict = if candidate.ignore_sailing_term {
            Verdict::Accepted { by_override: true }
        } else if self.has_domain_term(candidate.title, candidate.description) {
            Verdict::Accepted { by_override: false }
        } else {
            Verdict::Rejected(RejectReason::NoDomainTerm)
        };

        if verdict.is_accepted() && candidate.video_count == 0 {
            return Verdict::Rejected(RejectReason::NoVideos);
        }

        verdict
    }

    /// Persists the side effects of a verdict: memoizes term rejections and
    /// removes blacklisted or empty channels from the corpus.
    pub async fn apply(
        &self,
        store: &dyn CrawlStore,
        channel_id: &str,
        verdict: Verdict,
        now: i64,
    ) -> CrawlResult<()> {
        match verdict {
            Verdict::Rejected(RejectReason::Blacklisted) => {
                info!("Channel {channel_id} is blacklisted, removing it");
                store.delete_channel(channel_id).await
            }
            Verdict::Rejected(RejectReason::NoDomainTerm) => {
                store
                    .record_non_domain(&NonDomainChannel {
                        channel_id: channel_id.to_string(),
                        decided_at: now,
                    })
                    .await
            }
            Verdict::Rejected(RejectReason::NoVideos) => store.delete_channel(channel_id).await,
            Verdict::Rejected(RejectReason::KnownNonDomain) | Verdict::Accepted { .. } => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(
            vec!["Sailing".to_string(), "catamaran".to_string()],
            vec!["UCblocked".to_string()],
        )
    }

    fn candidate<'a>(id: &'a str, title: &'a str, ignore: bool) -> Candidate<'a> {
        Candidate {
            channel_id: id,
            title,
            description: "",
            video_count: 5,
            ignore_sailing_term: ignore,
        }
    }

    #[test]
    fn accepts_case_insensitive_term_in_title() {
        let verdict = classifier().classify(&candidate("UC1", "Sailing with Sam", false));
        assert_eq!(verdict, Verdict::Accepted { by_override: false });
    }

    #[test]
    fn accepts_term_in_description() {
        let c = Candidate {
            description: "Life aboard our CATAMARAN",
            ..candidate("UC1", "Sam & Ann", false)
        };
        assert!(classifier().classify(&c).is_accepted());
    }

    #[test]
    fn rejects_without_term() {
        let verdict = classifier().classify(&candidate("UC1", "Cooking with Sam", false));
        assert_eq!(verdict, Verdict::Rejected(RejectReason::NoDomainTerm));
    }

    #[test]
    fn override_accepts_without_term() {
        let verdict = classifier().classify(&candidate("UC1", "Cooking with Sam", true));
        assert_eq!(verdict, Verdict::Accepted { by_override: true });
    }

    #[test]
    fn blacklist_beats_term_and_override() {
        let verdict = classifier().classify(&candidate("UCblocked", "Sailing Sam", true));
        assert_eq!(verdict, Verdict::Rejected(RejectReason::Blacklisted));
    }

    #[test]
    fn zero_videos_rejected_even_when_matching() {
        let c = Candidate {
            video_count: 0,
            ..candidate("UC1", "Sailing with Sam", false)
        };
        assert_eq!(
            classifier().classify(&c),
            Verdict::Rejected(RejectReason::NoVideos)
        );
    }
}
