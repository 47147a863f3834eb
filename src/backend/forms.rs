//! Form definition lookup
//!
//! Definitions are fetched once per form key and held in a [`FormCache`] that
//! lives for a single run. All missing keys are requested concurrently, and
//! resolution finishes before any response is reconciled against the cache.

use std::collections::{BTreeMap, BTreeSet};

use futures::future::join_all;
use reqwest::Url;
use tracing::{debug, warn};

use super::auth::AccessToken;
use super::transport::Transport;
use crate::error::{DownloadError, DownloadResult, FailureReason};
use crate::models::{FormDefinition, FormKey};

/// Form definitions resolved during one run
#[derive(Debug, Default)]
pub struct FormCache {
    entries: BTreeMap<FormKey, FormDefinition>,
}

impl FormCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &FormKey) -> Option<&FormDefinition> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &FormKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Store a definition; an existing entry is kept
    pub fn insert(&mut self, key: FormKey, definition: FormDefinition) {
        self.entries.entry(key).or_insert(definition);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fetches form definitions from the questionnaire endpoint
pub struct FormResolver<'a> {
    transport: &'a dyn Transport,
    base_url: &'a str,
    token: &'a AccessToken,
    language_code: &'a str,
}

impl<'a> FormResolver<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        base_url: &'a str,
        token: &'a AccessToken,
        language_code: &'a str,
    ) -> Self {
        Self {
            transport,
            base_url,
            token,
            language_code,
        }
    }

    /// URL of the definition for `key`
    pub fn form_url(&self, key: &FormKey) -> DownloadResult<String> {
        let url = Url::parse_with_params(
            &format!("{}/questionnaire", self.base_url),
            &[
                ("url", key.form_id.as_str()),
                ("version", key.version.as_str()),
                ("languageCode", self.language_code),
            ],
        )
        .map_err(|e| DownloadError::Config(format!("Invalid backend URL: {}", e)))?;
        Ok(url.into())
    }

    /// Fetch one definition
    pub async fn resolve(&self, key: &FormKey) -> DownloadResult<FormDefinition> {
        let reply = self
            .transport
            .get(&self.form_url(key)?, Some(self.token.as_str()))
            .await?;
        debug!(form = %key, status = reply.status, "Form definition reply");

        if !reply.is_ok() {
            return Err(DownloadError::Resolve {
                key: key.clone(),
                reason: FailureReason::from_status(reply.status),
            });
        }
        reply.json()
    }

    /// Resolve every key not yet in `cache`, concurrently
    ///
    /// Returns the keys that could not be resolved. Each key is requested at
    /// most once, however often it appears in `keys`.
    pub async fn resolve_all<I>(&self, keys: I, cache: &mut FormCache) -> Vec<(FormKey, FailureReason)>
    where
        I: IntoIterator<Item = FormKey>,
    {
        let missing: BTreeSet<FormKey> = keys.into_iter().filter(|k| !cache.contains(k)).collect();

        let lookups = missing.into_iter().map(|key| async move {
            let result = self.resolve(&key).await;
            (key, result)
        });

        let mut unresolved = Vec::new();
        for (key, result) in join_all(lookups).await {
            match result {
                Ok(definition) => cache.insert(key, definition),
                Err(e) => {
                    warn!(form = %key, error = %e, "Form definition unavailable");
                    let reason = match e {
                        DownloadError::Resolve { reason, .. } => reason,
                        _ => FailureReason::Unknown(0),
                    };
                    unresolved.push((key, reason));
                }
            }
        }
        unresolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use serde_json::json;

    const BASE: &str = "https://backend.test/api";

    fn definition(url: &str, version: &str) -> String {
        json!({
            "resourceType": "Questionnaire",
            "url": url,
            "version": version,
            "item": [{"linkId": "q1", "type": "string"}]
        })
        .to_string()
    }

    #[test]
    fn test_form_url_is_encoded() {
        let token = AccessToken::new("tok");
        let transport = FakeTransport::new();
        let resolver = FormResolver::new(&transport, BASE, &token, "de");

        let url = resolver
            .form_url(&FormKey::new("https://forms.example.org/Questionnaire/a b", "1.0"))
            .unwrap();
        assert_eq!(
            url,
            "https://backend.test/api/questionnaire?url=https%3A%2F%2Fforms.example.org%2FQuestionnaire%2Fa+b&version=1.0&languageCode=de"
        );
    }

    #[tokio::test]
    async fn test_one_call_per_distinct_key() {
        let token = AccessToken::new("tok");
        let a = FormKey::new("urn:a", "1");
        let b = FormKey::new("urn:b", "2");

        let url_source = FakeTransport::new();
        let url_a = FormResolver::new(&url_source, BASE, &token, "de").form_url(&a).unwrap();
        let url_b = FormResolver::new(&url_source, BASE, &token, "de").form_url(&b).unwrap();

        let transport = FakeTransport::new()
            .reply(&url_a, 200, definition("urn:a", "1"))
            .reply(&url_b, 200, definition("urn:b", "2"));
        let resolver = FormResolver::new(&transport, BASE, &token, "de");

        let keys: Vec<FormKey> = (0..10)
            .map(|i| if i % 3 == 0 { a.clone() } else { b.clone() })
            .collect();
        let mut cache = FormCache::new();
        let unresolved = resolver.resolve_all(keys.clone(), &mut cache).await;

        assert!(unresolved.is_empty());
        assert_eq!(transport.calls().len(), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&b).unwrap().version.as_deref(), Some("2"));

        // Already cached: no further calls
        resolver.resolve_all(keys, &mut cache).await;
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let token = AccessToken::new("tok");
        let good = FormKey::new("urn:good", "1");
        let denied = FormKey::new("urn:denied", "1");
        let gone = FormKey::new("urn:gone", "1");
        let flaky = FormKey::new("urn:flaky", "1");
        let broken = FormKey::new("urn:broken", "1");

        let url_source = FakeTransport::new();
        let urls = FormResolver::new(&url_source, BASE, &token, "de");
        let transport = FakeTransport::new()
            .reply(&urls.form_url(&good).unwrap(), 200, definition("urn:good", "1"))
            .reply(&urls.form_url(&denied).unwrap(), 401, "")
            .reply(&urls.form_url(&broken).unwrap(), 500, "")
            .fail(&urls.form_url(&flaky).unwrap(), "reset");
        let resolver = FormResolver::new(&transport, BASE, &token, "de");

        let mut cache = FormCache::new();
        let mut unresolved = resolver
            .resolve_all(
                vec![
                    good.clone(),
                    denied.clone(),
                    gone.clone(),
                    flaky.clone(),
                    broken.clone(),
                ],
                &mut cache,
            )
            .await;
        unresolved.sort_by(|a, b| a.0.cmp(&b.0));

        assert!(cache.contains(&good));
        assert_eq!(cache.len(), 1);
        assert_eq!(
            unresolved,
            vec![
                (broken, FailureReason::Unknown(500)),
                (denied, FailureReason::Unauthorized),
                (flaky, FailureReason::Unknown(0)),
                (gone, FailureReason::NotFound),
            ]
        );
    }
}
