//! UTXO fetcher failover against mocked providers


use std::time::Duration;

use satsend_core::error::{EngineError, ProviderError};
use satsend_core::provider::{Provider, ProviderSet};
use satsend_core::types::UnspentOutput;
use satsend_core::utxo::{UtxoFetcher, UtxoShape};
use serde_json::json;
use test_helpers::{esplora_utxo, http, setup, txid, SENDER};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn esplora(name: &str, server: &MockServer, prefix: &str) -> Provider<UtxoShape> {
    Provider::new(
        name,
        format!("{}/{}/address/{{address}}/utxo", server.uri(), prefix),
        UtxoShape::Esplora,
    )
}

fn utxo_path(prefix: &str) -> String {
    format!("/{}/address/{}/utxo", prefix, SENDER)
}

#[tokio::test]
async fn test_first_provider_answer_wins() {
    setup();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(utxo_path("primary")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            esplora_utxo(&txid("aa"), 0, 50_000, true),
            esplora_utxo(&txid("bb"), 1, 30_000, false),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(utxo_path("backup")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let fetcher = UtxoFetcher::new(
        ProviderSet::new(vec![esplora("primary", &server, "primary"), esplora("backup", &server, "backup")]),
        http(2_000),
    );

    let utxos = fetcher.fetch(SENDER).await.unwrap();
    assert_eq!(
        utxos,
        vec![
            UnspentOutput::confirmed(txid("aa"), 0, 50_000),
            UnspentOutput::unconfirmed(txid("bb"), 1, 30_000),
        ]
    );
}

#[tokio::test]
async fn test_error_then_success() {
    setup();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(utxo_path("down")))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(utxo_path("up")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            esplora_utxo(&txid("cc"), 2, 75_000, true),
        ])))
        .mount(&server)
        .await;

    let fetcher = UtxoFetcher::new(
        ProviderSet::new(vec![esplora("down", &server, "down"), esplora("up", &server, "up")]),
        http(2_000),
    );

    let utxos = fetcher.fetch(SENDER).await.unwrap();
    assert_eq!(utxos, vec![UnspentOutput::confirmed(txid("cc"), 2, 75_000)]);
}

#[tokio::test]
async fn test_timeout_moves_to_next_provider() {
    setup();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(utxo_path("slow")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([esplora_utxo(&txid("aa"), 0, 1, true)]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(utxo_path("fast")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            esplora_utxo(&txid("dd"), 0, 42_000, true),
        ])))
        .mount(&server)
        .await;

    let fetcher = UtxoFetcher::new(
        ProviderSet::new(vec![esplora("slow", &server, "slow"), esplora("fast", &server, "fast")]),
        http(200),
    );

    let utxos = fetcher.fetch(SENDER).await.unwrap();
    assert_eq!(utxos, vec![UnspentOutput::confirmed(txid("dd"), 0, 42_000)]);
}

#[tokio::test]
async fn test_empty_answer_falls_through_to_next() {
    setup();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(utxo_path("lagging")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let blockcypher = Provider::new(
        "blockcypher",
        format!("{}/v1/btc/main/addrs/{{address}}?unspentOnly=true", server.uri()),
        UtxoShape::BlockCypher,
    );
    Mock::given(method("GET"))
        .and(path(format!("/v1/btc/main/addrs/{}", SENDER)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "address": SENDER,
            "txrefs": [
                { "tx_hash": txid("ee"), "tx_output_n": 1, "value": 20_000, "confirmations": 3 }
            ]
        })))
        .mount(&server)
        .await;

    let fetcher = UtxoFetcher::new(
        ProviderSet::new(vec![esplora("lagging", &server, "lagging"), blockcypher]),
        http(2_000),
    );

    let utxos = fetcher.fetch(SENDER).await.unwrap();
    assert_eq!(utxos, vec![UnspentOutput::confirmed(txid("ee"), 1, 20_000)]);
}

#[tokio::test]
async fn test_all_empty_is_empty_result() {
    setup();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(utxo_path("a")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(utxo_path("b")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let fetcher = UtxoFetcher::new(
        ProviderSet::new(vec![esplora("a", &server, "a"), esplora("b", &server, "b")]),
        http(2_000),
    );

    assert!(fetcher.fetch(SENDER).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_every_provider_failing_is_lookup_failure() {
    setup();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(utxo_path("a")))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(utxo_path("b")))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let fetcher = UtxoFetcher::new(
        ProviderSet::new(vec![esplora("a", &server, "a"), esplora("b", &server, "b")]),
        http(2_000),
    );

    match fetcher.fetch(SENDER).await.unwrap_err() {
        EngineError::UtxoLookupFailed { attempts } => {
            assert_eq!(attempts.len(), 2);
            assert_eq!(attempts[0].provider, "a");
            assert_eq!(
                attempts[0].error,
                ProviderError::Status {
                    status: 429,
                    body: "rate limited".to_string()
                }
            );
            assert!(matches!(attempts[1].error, ProviderError::Malformed(_)));
        }
        other => panic!("expected UtxoLookupFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_blockchain_info_shape_over_http() {
    setup();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/unspent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "unspent_outputs": [
                { "tx_hash_big_endian": txid("12"), "tx_output_n": 0, "value": 15_000, "confirmations": 0 }
            ]
        })))
        .mount(&server)
        .await;

    let fetcher = UtxoFetcher::new(
        ProviderSet::new(vec![Provider::new(
            "blockchain.info",
            format!("{}/unspent?active={{address}}", server.uri()),
            UtxoShape::BlockchainInfo,
        )]),
        http(2_000),
    );

    let utxos = fetcher.fetch(SENDER).await.unwrap();
    assert_eq!(utxos, vec![UnspentOutput::unconfirmed(txid("12"), 0, 15_000)]);
}
