use currenz::core::config::AppConfig;
use currenz::core::{ChatUser, Inbound, UsageReport};
use currenz::store::KeyValueStore;
use tracing::info;

// Adds automatic logging to test
mod test_utils {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_rates_server(base: &str, rates: &str, expected_calls: u64) -> MockServer {
        let mock_server = MockServer::start().await;
        let body = format!(
            r#"{{"result": "success", "base_code": "{base}", "rates": {rates}}}"#
        );

        Mock::given(method("GET"))
            .and(path(format!("/{base}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(expected_calls)
            .mount(&mock_server)
            .await;

        mock_server
    }
}

fn config_for(uri: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.provider.base_url = uri.to_string();
    config
}

#[test_log::test(tokio::test)]
async fn test_free_text_conversion_end_to_end() {
    let mock_server =
        test_utils::create_rates_server("USDT", r#"{"USDT": 1, "BDT": 110.5}"#, 1).await;
    let store = KeyValueStore::in_memory();
    let services = currenz::build_services(&config_for(&mock_server.uri()), &store).unwrap();
    let user = ChatUser::new(42).with_first_name("Sam");

    let reply = services
        .dispatcher
        .handle(&Inbound::from_text(user.clone(), "50 USDT in BDT"))
        .await;
    info!(text = %reply.text, "Conversion reply");
    assert!(reply.text.contains("50.00 🇺🇸 USDT = 5525.00 🇧🇩 BDT"));

    // Served from the rate cache
    let reply = services
        .dispatcher
        .handle(&Inbound::from_text(user, "exchange 2 usdt into bdt"))
        .await;
    assert!(reply.text.contains("= 221.00 🇧🇩 BDT"));

    let pairs = services.usage.popular_conversions(5).await;
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].count, 2);
    assert_eq!(services.usage.user_count().await, 1);
}

#[test_log::test(tokio::test)]
async fn test_wizard_end_to_end() {
    let mock_server =
        test_utils::create_rates_server("EUR", r#"{"EUR": 1, "USD": 1.1}"#, 1).await;
    let store = KeyValueStore::in_memory();
    let services = currenz::build_services(&config_for(&mock_server.uri()), &store).unwrap();
    let user = ChatUser::new(7);
    let dispatcher = &services.dispatcher;

    let reply = dispatcher
        .handle(&Inbound::from_text(user.clone(), "/convert"))
        .await;
    assert!(reply.keyboard.is_some());
    for payload in ["EUR", "USD"] {
        let event = Inbound::callback(user.clone(), payload);
        dispatcher.handle(&event).await;
    }
    let reply = dispatcher.handle(&Inbound::text(user, "100")).await;

    assert!(reply.text.contains("100.00 🇪🇺 EUR = 110.00 🇺🇸 USD"));
    let top = services.usage.top_commands(5).await;
    assert_eq!(top[0].name, "convert");
    assert_eq!(top[0].count, 1);
}

#[test_log::test(tokio::test)]
async fn test_unreachable_provider_asks_to_retry() {
    let mut config = AppConfig::default();
    config.provider.base_url = "http://127.0.0.1:9".to_string();
    config.provider.timeout_secs = 2;
    let store = KeyValueStore::in_memory();
    let services = currenz::build_services(&config, &store).unwrap();

    let reply = services
        .dispatcher
        .handle(&Inbound::from_text(ChatUser::new(1), "10 xyz to usd"))
        .await;

    assert!(reply.text.contains("try again later"));
    assert!(services.usage.popular_conversions(5).await.is_empty());
}

#[test_log::test(tokio::test)]
async fn test_usage_survives_reopen() {
    let mock_server = test_utils::create_rates_server("GBP", r#"{"JPY": 190.0}"#, 1).await;
    let data_dir = tempfile::tempdir().unwrap();
    let config = config_for(&mock_server.uri());

    {
        let store = KeyValueStore::open(data_dir.path());
        let services = currenz::build_services(&config, &store).unwrap();
        services
            .dispatcher
            .handle(&Inbound::from_text(ChatUser::new(3), "1 gbp to jpy"))
            .await;
    }

    let store = KeyValueStore::open(data_dir.path());
    let services = currenz::build_services(&config, &store).unwrap();
    let pairs = services.usage.popular_conversions(5).await;

    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].from.as_str(), "GBP");
    assert_eq!(pairs[0].to.as_str(), "JPY");
    assert_eq!(services.usage.user_count().await, 1);
}

#[test_log::test(tokio::test)]
async fn test_report_command_with_config_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    let data_path = temp_dir.path().join("data");
    std::fs::write(
        &config_path,
        format!("data_path: \"{}\"\n", data_path.display()),
    )
    .unwrap();

    let result = currenz::run_command(
        currenz::AppCommand::Report {
            month: Some("2024-01".to_string()),
        },
        config_path.to_str(),
    )
    .await;
    assert!(result.is_ok(), "{result:?}");

    let result = currenz::run_command(
        currenz::AppCommand::Report {
            month: Some("January".to_string()),
        },
        config_path.to_str(),
    )
    .await;
    assert!(result.is_err());
}
