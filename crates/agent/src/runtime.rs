use std::sync::Arc;

use serde::Serialize;
use sizequote_core::config::AppConfig;
use sizequote_core::domain::quote::{QuoteResult, SubmissionId};
use sizequote_core::errors::{ApplicationError, DomainError};
use sizequote_core::pricing::aliases::AliasTable;
use sizequote_core::pricing::composer::{DistanceLookup, LineItemComposer};
use sizequote_core::pricing::policy::PricingPolicy;
use sizequote_core::pricing::store::PriceTableStore;
use sizequote_core::session::{DebugLog, QuoteSession};
use tracing::{info, warn};

use crate::distance::GoogleDistanceClient;
use crate::extraction::{build_system_prompt, extract_json_block, parse_outcome, ExtractionOutcome};
use crate::llm::{client_from_config, LlmClient};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Quoted { result: QuoteResult },
    NotFound { id: SubmissionId, message: String },
}

/// Runs one submission end to end: extraction, per-item pricing, optional delivery.
pub struct QuoteRuntime {
    llm: Arc<dyn LlmClient>,
    distance: Arc<dyn DistanceLookup>,
    store: Arc<PriceTableStore>,
    aliases: AliasTable,
    composer: LineItemComposer,
}

impl QuoteRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        distance: Arc<dyn DistanceLookup>,
        store: Arc<PriceTableStore>,
        aliases: AliasTable,
        composer: LineItemComposer,
    ) -> Self {
        Self { llm, distance, store, aliases, composer }
    }

    pub fn from_config(
        config: &AppConfig,
        store: Arc<PriceTableStore>,
    ) -> Result<Self, ApplicationError> {
        let llm = client_from_config(&config.llm)?;
        let distance = GoogleDistanceClient::from_config(&config.distance)?;

        let mut aliases = AliasTable::default();
        aliases.extend(
            config.aliases.iter().map(|(alias, target)| (alias.as_str(), target.as_str())),
        );

        Ok(Self::new(
            llm,
            Arc::new(distance),
            store,
            aliases,
            LineItemComposer::new(PricingPolicy::from_config(config)),
        ))
    }

    pub fn store(&self) -> &PriceTableStore {
        &self.store
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub async fn submit(
        &self,
        session: &mut QuoteSession,
        text: &str,
    ) -> Result<SubmissionOutcome, ApplicationError> {
        self.submit_with_id(session, SubmissionId::generate(), text).await
    }

    /// The submission's debug log is merged into the session whether or not it succeeds.
    pub async fn submit_with_id(
        &self,
        session: &mut QuoteSession,
        id: SubmissionId,
        text: &str,
    ) -> Result<SubmissionOutcome, ApplicationError> {
        let mut log = DebugLog::default();
        log.record("---");
        log.record(format!("input: {text}"));
        info!(
            event_name = "quote.submission.received",
            correlation_id = %id,
            "submission received"
        );

        let outcome = self.run(&id, text, &mut log).await;
        match &outcome {
            Ok(SubmissionOutcome::Quoted { result }) => {
                log.record(format!("result table:\n{}", result.render_table()));
                session.record_result(result.clone());
                info!(
                    event_name = "quote.submission.completed",
                    correlation_id = %id,
                    rows = result.rows.len(),
                    issues = result.issues.len(),
                    "submission quoted"
                );
            }
            Ok(SubmissionOutcome::NotFound { id, message }) => {
                log.record(format!("not found: {message}"));
                let mut empty = QuoteResult::new(id.clone(), text);
                empty.issues.push(message.clone());
                session.record_result(empty);
                info!(
                    event_name = "quote.submission.not_found",
                    correlation_id = %id,
                    "model reported no matching product"
                );
            }
            Err(error) => {
                log.record(format!("submission failed: {error}"));
                warn!(
                    event_name = "quote.submission.failed",
                    correlation_id = %id,
                    error = %error,
                    "submission aborted"
                );
            }
        }

        session.append_log(log);
        outcome
    }

    async fn run(
        &self,
        id: &SubmissionId,
        text: &str,
        log: &mut DebugLog,
    ) -> Result<SubmissionOutcome, ApplicationError> {
        if text.trim().is_empty() {
            return Err(DomainError::EmptySubmission.into());
        }

        let prompt = build_system_prompt(self.store.product_keys());
        log.record(format!("prompt:\n{prompt}"));

        let raw = self.llm.complete(&prompt, text).await?;
        log.record(format!("model reply (raw):\n{raw}"));

        let block = extract_json_block(&raw)?;
        log.record(format!("JSON block:\n{block}"));

        let items = match parse_outcome(block, &self.aliases)? {
            ExtractionOutcome::Unrecognized { message } => {
                return Ok(SubmissionOutcome::NotFound { id: id.clone(), message });
            }
            ExtractionOutcome::Recognized(items) => items,
        };
        log.record(format!("parsed items: {items:?}"));

        let mut result = QuoteResult::new(id.clone(), text);
        for (index, item) in items.into_iter().enumerate() {
            let position = index + 1;
            let priced = match item {
                Ok(request) => {
                    self.composer
                        .quote_item(&self.store, &request, self.distance.as_ref(), log)
                        .await
                }
                Err(error) => Err(error),
            };

            match priced {
                Ok(composed) => {
                    result.rows.extend(composed.rows);
                    if let Some(error) = composed.delivery_error {
                        warn!(
                            event_name = "quote.item.delivery_failed",
                            correlation_id = %id,
                            position,
                            error = %error,
                            "delivery row omitted"
                        );
                        result
                            .issues
                            .push(format!("položka {position}: doprava nevypočtena: {error}"));
                    }
                }
                Err(error) => {
                    log.record(format!("item {position} skipped: {error}"));
                    warn!(
                        event_name = "quote.item.skipped",
                        correlation_id = %id,
                        position,
                        error = %error,
                        "line item skipped"
                    );
                    result.issues.push(format!("položka {position}: {error}"));
                }
            }
        }

        Ok(SubmissionOutcome::Quoted { result })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use sizequote_core::domain::product::ProductKey;
    use sizequote_core::domain::quote::RowKind;
    use sizequote_core::errors::{ApplicationError, ReplyFault};
    use sizequote_core::pricing::aliases::AliasTable;
    use sizequote_core::pricing::composer::{DistanceLookup, LineItemComposer};
    use sizequote_core::pricing::store::PriceTableStore;
    use sizequote_core::pricing::table::PriceTable;
    use sizequote_core::session::{DebugLog, QuoteSession};

    use super::{QuoteRuntime, SubmissionOutcome};
    use crate::extraction::ExtractionError;
    use crate::llm::LlmClient;

    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<String, ExtractionError>>>,
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedLlm {
        fn new(replies: impl IntoIterator<Item = Result<String, ExtractionError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn reply(text: &str) -> Self {
            Self::new([Ok(text.to_string())])
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, system: &str, user: &str) -> Result<String, ExtractionError> {
            self.prompts.lock().expect("prompts lock").push((system.to_string(), user.to_string()));
            self.replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .unwrap_or(Err(ExtractionError::EmptyResponse))
        }
    }

    struct FixedDistance(Decimal);

    #[async_trait]
    impl DistanceLookup for FixedDistance {
        async fn distance_km(
            &self,
            _origin: &str,
            _destination: &str,
            _log: &mut DebugLog,
        ) -> Result<Decimal, ApplicationError> {
            Ok(self.0)
        }
    }

    fn store() -> Arc<PriceTableStore> {
        Arc::new(PriceTableStore::new([
            PriceTable::from_csv_str(
                ProductKey::new("ALUX Glass"),
                ",5000,6000,7000\n2000,8000,9000,9500\n2500,8500,10000,11000\n3000,9000,10500,12000\n",
            )
            .expect("glass parses"),
            PriceTable::from_csv_str(
                ProductKey::new("screen"),
                ",3000,4000,5000\n2500,7000,8000,9000\n3000,7500,8500,9500\n",
            )
            .expect("screen parses"),
        ]))
    }

    struct FailingDistance;

    #[async_trait]
    impl DistanceLookup for FailingDistance {
        async fn distance_km(
            &self,
            _origin: &str,
            _destination: &str,
            _log: &mut DebugLog,
        ) -> Result<Decimal, ApplicationError> {
            Err(ApplicationError::Integration("distance element status NOT_FOUND".to_string()))
        }
    }

    fn runtime(llm: Arc<ScriptedLlm>) -> QuoteRuntime {
        runtime_with_distance(llm, Arc::new(FixedDistance(Decimal::new(215, 1))))
    }

    fn runtime_with_distance(
        llm: Arc<ScriptedLlm>,
        distance: Arc<dyn DistanceLookup>,
    ) -> QuoteRuntime {
        QuoteRuntime::new(
            llm,
            distance,
            store(),
            AliasTable::default(),
            LineItemComposer::default(),
        )
    }

    #[tokio::test]
    async fn quoted_submission_lands_at_the_top_of_history() {
        let screen = r#"[{"produkt": "screen", "šířka": 3000, "hloubka_výška": 2500,
            "misto": "neuvedeno"}]"#;
        let glass = r#"Výsledek: [{"produkt": "ALUX Glass", "šířka": 6000, "hloubka_výška": 2500,
            "misto": "Brno"}]"#;
        let llm = Arc::new(ScriptedLlm::new([Ok(screen.to_string()), Ok(glass.to_string())]));
        let runtime = runtime(llm.clone());
        let mut session = QuoteSession::new();

        runtime.submit(&mut session, "screen 3000x2500").await.expect("first submission");
        let outcome = runtime
            .submit(&mut session, "ALUX Glass 6000x2500 Brno")
            .await
            .expect("second submission");

        let SubmissionOutcome::Quoted { result } = outcome else {
            panic!("expected a quote");
        };
        let prices = result.rows.iter().map(|row| row.price).collect::<Vec<_>>();
        assert_eq!(
            prices,
            vec![
                Decimal::from(10_000),
                Decimal::from(1_200),
                Decimal::from(1_300),
                Decimal::from(1_400),
                Decimal::from(1_500),
                Decimal::from(645)
            ]
        );
        assert_eq!(result.rows[5].kind, RowKind::Delivery);

        assert_eq!(session.len(), 2);
        assert_eq!(
            session.latest().map(|latest| latest.input.as_str()),
            Some("ALUX Glass 6000x2500 Brno")
        );

        let prompts = llm.prompts.lock().expect("prompts lock");
        assert!(prompts[0].0.contains("alux glass, screen"));
        assert_eq!(prompts[0].1, "screen 3000x2500");
    }

    #[tokio::test]
    async fn malformed_item_is_skipped_and_reported() {
        let llm = Arc::new(ScriptedLlm::reply(
            r#"[
                {"produkt": "ALUX Glass", "šířka": 6000, "hloubka_výška": 2500},
                {"produkt": "ALUX Glass", "šířka": "abc", "hloubka_výška": 2500},
                {"produkt": "boční screen", "šířka": 3500, "hloubka_výška": null}
            ]"#,
        ));
        let runtime = runtime(llm);
        let mut session = QuoteSession::new();

        let outcome = runtime.submit(&mut session, "three items").await.expect("submission");

        let SubmissionOutcome::Quoted { result } = outcome else {
            panic!("expected a quote");
        };
        assert_eq!(result.rows.len(), 6, "5 glass rows plus 1 screen row");
        assert_eq!(result.rows[5].description, "3500 × 2500 mm");
        assert_eq!(result.issues.len(), 1);
        assert!(result.issues[0].starts_with("položka 2:"));
        assert!(session.debug_log().render().contains("item 2 skipped"));
    }

    #[tokio::test]
    async fn failed_distance_lookup_is_reported_as_an_issue() {
        let llm = Arc::new(ScriptedLlm::reply(
            r#"[{"produkt": "screen", "šířka": 3000, "misto": "Xyzzyville"}]"#,
        ));
        let runtime = runtime_with_distance(llm, Arc::new(FailingDistance));
        let mut session = QuoteSession::new();

        let outcome =
            runtime.submit(&mut session, "screen 3000 Xyzzyville").await.expect("submission");

        let SubmissionOutcome::Quoted { result } = outcome else {
            panic!("expected a quote");
        };
        assert_eq!(result.rows.len(), 1);
        assert_eq!(
            result.issues,
            vec![
                "položka 1: doprava nevypočtena: integration failure: distance element status NOT_FOUND"
                    .to_string()
            ]
        );
        assert!(session.debug_log().render().contains("distance lookup failed for `Xyzzyville`"));
    }

    #[tokio::test]
    async fn not_found_reply_is_recorded_as_an_empty_result() {
        let llm = Arc::new(ScriptedLlm::reply(
            r#"[{"nenalezeno": true, "zprava": "Neznámý produkt."}]"#,
        ));
        let runtime = runtime(llm);
        let mut session = QuoteSession::new();

        let outcome = runtime.submit(&mut session, "pergola 3x3").await.expect("submission");

        assert!(matches!(
            outcome,
            SubmissionOutcome::NotFound { ref message, .. } if message == "Neznámý produkt."
        ));
        assert_eq!(session.len(), 1);
        let recorded = session.latest().expect("empty result recorded");
        assert!(recorded.rows.is_empty());
        assert_eq!(recorded.issues, vec!["Neznámý produkt.".to_string()]);
        assert!(session.debug_log().render().contains("not found: Neznámý produkt."));
    }

    #[tokio::test]
    async fn extraction_failure_aborts_but_keeps_prior_history_and_log() {
        let llm = Arc::new(ScriptedLlm::new([
            Ok(r#"[{"produkt": "screen", "šířka": 3000}]"#.to_string()),
            Ok("Omlouvám se, nerozumím.".to_string()),
        ]));
        let runtime = runtime(llm);
        let mut session = QuoteSession::new();

        runtime.submit(&mut session, "screen 3000").await.expect("first submission");
        let error = runtime.submit(&mut session, "???").await.expect_err("no JSON array");

        assert_eq!(
            error,
            ApplicationError::ModelReply {
                fault: ReplyFault::MissingJsonArray,
                message: ExtractionError::MissingJsonArray.to_string(),
            }
        );
        assert_eq!(session.len(), 1);
        let log = session.debug_log().render();
        assert!(log.contains("input: screen 3000"));
        assert!(log.contains("submission failed"));
    }

    #[tokio::test]
    async fn blank_input_is_rejected_before_calling_the_model() {
        let llm = Arc::new(ScriptedLlm::reply("[]"));
        let runtime = runtime(llm.clone());
        let mut session = QuoteSession::new();

        let error = runtime.submit(&mut session, "   ").await.expect_err("blank input");

        assert!(matches!(error, ApplicationError::Domain(_)));
        assert!(llm.prompts.lock().expect("prompts lock").is_empty());
    }
}
