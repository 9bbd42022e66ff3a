mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use query_engine_translation::translation::client::UNKNOWN_REFUSAL_REASON;
use query_engine_translation::translation::{
    build_prompt, ChatCompletionsModel, ModelError, Role, TranslationResult, Translator,
};

mod scripted {
    use super::*;
    use crate::common::ScriptedModel;

    #[tokio::test]
    async fn returns_cleaned_statement() {
        let model = ScriptedModel::new(vec![Ok(
            "```sql\nSELECT * FROM customers WHERE lastname = 'Smith';\n```".to_string(),
        )]);
        let translator = Translator::new(model.clone());
        let prompt = build_prompt("Get all customers with lastname Smith", &common::small_schema());

        assert_eq!(
            translator.translate(&prompt).await,
            TranslationResult::Success {
                sql_text: "SELECT * FROM customers WHERE lastname = 'Smith';".to_string()
            }
        );
        assert_eq!(model.calls().len(), 1);
    }

    #[tokio::test]
    async fn refusal_is_explained_by_a_follow_up() {
        let model = ScriptedModel::new(vec![
            Ok("X".to_string()),
            Ok("  Column 'experience' does not exist in table 'employees'\n".to_string()),
        ]);
        let translator = Translator::new(model.clone());
        let prompt = build_prompt(
            "Get all employees with experience greater than 5 years",
            &common::small_schema(),
        );

        assert_eq!(
            translator.translate(&prompt).await,
            TranslationResult::Unsupported {
                reason: "Column 'experience' does not exist in table 'employees'".to_string()
            }
        );

        let calls = model.calls();
        assert_eq!(calls.len(), 2);
        let follow_up = &calls[1];
        assert_eq!(follow_up.len(), 4);
        assert_eq!(follow_up[2].role, Role::Assistant);
        assert_eq!(follow_up[2].content, "X");
        assert_eq!(follow_up[3].role, Role::User);
        assert!(follow_up[3]
            .content
            .contains("'Get all employees with experience greater than 5 years'"));
    }

    #[tokio::test]
    async fn quoted_refusal_counts_as_refusal() {
        let model = ScriptedModel::new(vec![Ok("\"X\"".to_string()), Ok(String::new())]);
        let translator = Translator::new(model);
        let prompt = build_prompt("Get all orders", &common::small_schema());

        assert_eq!(
            translator.translate(&prompt).await,
            TranslationResult::Unsupported {
                reason: UNKNOWN_REFUSAL_REASON.to_string()
            }
        );
    }

    #[tokio::test]
    async fn prose_is_passed_through_unmodified() {
        let model = ScriptedModel::new(vec![Ok(
            "The request is ambiguous: which account?".to_string()
        )]);
        let translator = Translator::new(model);
        let prompt = build_prompt("Show the account", &common::small_schema());

        assert_eq!(
            translator.translate(&prompt).await,
            TranslationResult::Unsupported {
                reason: "The request is ambiguous: which account?".to_string()
            }
        );
    }

    #[tokio::test]
    async fn model_failure_is_a_model_error() {
        let model = ScriptedModel::new(vec![Err(ModelError::Transport(
            "connection refused".to_string(),
        ))]);
        let translator = Translator::new(model);
        let prompt = build_prompt("list accounts", &common::small_schema());

        assert_eq!(
            translator.translate(&prompt).await,
            TranslationResult::ModelError {
                reason: "API request failed".to_string(),
                timed_out: false
            }
        );
    }
}

mod chat_completions {
    use super::*;
    use crate::common::{completion, fake_endpoint, settings};

    #[tokio::test]
    async fn sends_the_conversation_and_reads_the_first_choice() {
        let (url, endpoint) = fake_endpoint(
            vec![(StatusCode::OK, completion("SELECT * FROM accounts ORDER BY random() LIMIT 5"))],
            Duration::ZERO,
        )
        .await;
        let model = ChatCompletionsModel::new(settings(url)).unwrap();
        let translator = Translator::new(Arc::new(model));
        let prompt = build_prompt(
            "Selecciona aleatoriamente 5 cuentas bancarias",
            &common::small_schema(),
        );

        assert_eq!(
            translator.translate(&prompt).await,
            TranslationResult::Success {
                sql_text: "SELECT * FROM accounts ORDER BY random() LIMIT 5".to_string()
            }
        );

        let requests = endpoint.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer test-key"));
        let body = &requests[0].body;
        assert_eq!(body["model"], "grok-3-beta");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(
            body["messages"][1]["content"],
            "Selecciona aleatoriamente 5 cuentas bancarias"
        );
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_reported() {
        let (url, endpoint) = fake_endpoint(
            vec![(StatusCode::INTERNAL_SERVER_ERROR, "{}".to_string())],
            Duration::ZERO,
        )
        .await;
        let model = ChatCompletionsModel::new(query_engine_translation::translation::ModelSettings {
            max_retries: 2,
            ..settings(url)
        })
        .unwrap();
        let translator = Translator::new(Arc::new(model));
        let prompt = build_prompt("list accounts", &common::small_schema());

        assert_eq!(
            translator.translate(&prompt).await,
            TranslationResult::ModelError {
                reason: "API error: 500".to_string(),
                timed_out: false
            }
        );
        assert_eq!(endpoint.requests().len(), 3);
    }

    #[tokio::test]
    async fn retry_recovers_from_a_transient_error() {
        let (url, endpoint) = fake_endpoint(
            vec![
                (StatusCode::TOO_MANY_REQUESTS, "{}".to_string()),
                (StatusCode::OK, completion("SELECT * FROM customers")),
            ],
            Duration::ZERO,
        )
        .await;
        let model = ChatCompletionsModel::new(query_engine_translation::translation::ModelSettings {
            max_retries: 1,
            ..settings(url)
        })
        .unwrap();
        let translator = Translator::new(Arc::new(model));
        let prompt = build_prompt("list customers", &common::small_schema());

        assert_eq!(
            translator.translate(&prompt).await,
            TranslationResult::Success {
                sql_text: "SELECT * FROM customers".to_string()
            }
        );
        assert_eq!(endpoint.requests().len(), 2);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let (url, endpoint) =
            fake_endpoint(vec![(StatusCode::UNAUTHORIZED, "{}".to_string())], Duration::ZERO)
                .await;
        let model = ChatCompletionsModel::new(query_engine_translation::translation::ModelSettings {
            max_retries: 3,
            ..settings(url)
        })
        .unwrap();
        let translator = Translator::new(Arc::new(model));
        let prompt = build_prompt("list customers", &common::small_schema());

        assert_eq!(
            translator.translate(&prompt).await,
            TranslationResult::ModelError {
                reason: "API error: 401".to_string(),
                timed_out: false
            }
        );
        assert_eq!(endpoint.requests().len(), 1);
    }

    #[tokio::test]
    async fn malformed_bodies_are_reported() {
        let (url, _) =
            fake_endpoint(vec![(StatusCode::OK, "not json".to_string())], Duration::ZERO).await;
        let translator = Translator::new(Arc::new(ChatCompletionsModel::new(settings(url)).unwrap()));
        let prompt = build_prompt("list customers", &common::small_schema());
        assert_eq!(
            translator.translate(&prompt).await,
            TranslationResult::ModelError {
                reason: "Invalid API response format".to_string(),
                timed_out: false
            }
        );

        let (url, _) = fake_endpoint(
            vec![(StatusCode::OK, r#"{"choices": []}"#.to_string())],
            Duration::ZERO,
        )
        .await;
        let translator = Translator::new(Arc::new(ChatCompletionsModel::new(settings(url)).unwrap()));
        assert_eq!(
            translator.translate(&prompt).await,
            TranslationResult::ModelError {
                reason: "Invalid API response structure".to_string(),
                timed_out: false
            }
        );
    }

    #[tokio::test]
    async fn slow_models_time_out() {
        let (url, _) = fake_endpoint(
            vec![(StatusCode::OK, completion("SELECT 1"))],
            Duration::from_secs(3),
        )
        .await;
        let model = ChatCompletionsModel::new(query_engine_translation::translation::ModelSettings {
            timeout: Duration::from_millis(200),
            ..settings(url)
        })
        .unwrap();
        let translator = Translator::new(Arc::new(model));
        let prompt = build_prompt("list customers", &common::small_schema());

        match translator.translate(&prompt).await {
            TranslationResult::ModelError { timed_out, .. } => assert!(timed_out),
            other => panic!("expected a timeout, got {other:?}"),
        }
    }
}
