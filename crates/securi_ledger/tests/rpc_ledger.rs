//! JSON-RPC ledger client against a mock endpoint.

use securi_core::{Address, ErrorKind, Fingerprint, Lookup, Principal, Session, TxHash};
use securi_ledger::abi;
use securi_ledger::{
    ChainParams, ConfirmationTracker, ErrorClassifier, JsonRpcClient, LedgerConfig, LedgerReader,
    LedgerWriter, RpcConfirmationTracker, RpcLedgerReader, RpcLedgerWriter, RpcSigningProvider,
    SigningProvider, TxHandle,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONTRACT: Address = Address::from_bytes([0xc0; 20]);
const AUTHOR: Address = Address::from_bytes([0xa1; 20]);

fn fp() -> Fingerprint {
    Fingerprint::compute(b"\x89PNG test image").unwrap()
}

fn client(server: &MockServer) -> JsonRpcClient {
    JsonRpcClient::new(server.uri(), Duration::from_secs(5)).unwrap()
}

fn classifier() -> ErrorClassifier {
    ErrorClassifier::new(&LedgerConfig::default().already_certified_markers)
}

fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": result}))
}

fn rpc_error(code: i64, message: &str, data: Option<Value>) -> ResponseTemplate {
    let mut error = json!({"code": code, "message": message});
    if let Some(data) = data {
        error["data"] = data;
    }
    ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "error": error}))
}

async fn mount(server: &MockServer, rpc_method: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": rpc_method})))
        .respond_with(response)
        .mount(server)
        .await;
}

fn tracker(server: &MockServer, confirmations: u64, drop_grace_polls: u32) -> RpcConfirmationTracker {
    RpcConfirmationTracker::new(
        client(server),
        CONTRACT,
        confirmations,
        Duration::from_millis(10),
        drop_grace_polls,
        classifier(),
    )
}

fn handle() -> TxHandle {
    TxHandle {
        hash: TxHash::from_bytes([0x77; 32]),
        fingerprint: fp(),
        from: AUTHOR,
    }
}

fn certified_log(fingerprint: &Fingerprint, author: &Address, timestamp: u64) -> Value {
    json!({
        "address": CONTRACT.to_hex(),
        "topics": [
            abi::to_hex_data(&abi::event_topic(abi::CERTIFIED_EVENT_SIGNATURE)),
            fingerprint.to_hex(),
            abi::to_hex_data(&abi::address_word(author)),
        ],
        "data": abi::to_hex_data(&abi::u64_word(timestamp)),
    })
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn test_lookup_certified() {
    let server = MockServer::start().await;
    let result = abi::to_hex_data(&abi::encode_verify_result(&AUTHOR, 1_715_000_000, true));
    mount(&server, "eth_call", ok(json!(result))).await;

    let reader = RpcLedgerReader::new(client(&server), CONTRACT);
    let lookup = reader.lookup(&fp()).await.unwrap();

    assert!(lookup.exists());
    assert_eq!(lookup.author(), Some(AUTHOR));
    assert_eq!(lookup.timestamp(), Some(1_715_000_000));
}

#[tokio::test]
async fn test_lookup_uncertified() {
    let server = MockServer::start().await;
    let result = abi::to_hex_data(&abi::encode_verify_result(&Address::ZERO, 0, false));
    mount(&server, "eth_call", ok(json!(result))).await;

    let reader = RpcLedgerReader::new(client(&server), CONTRACT);
    assert_eq!(reader.lookup(&fp()).await.unwrap(), Lookup::Uncertified);
}

#[tokio::test]
async fn test_lookup_failures_are_network() {
    let server = MockServer::start().await;
    mount(&server, "eth_call", ResponseTemplate::new(503).set_body_string("overloaded")).await;
    let reader = RpcLedgerReader::new(client(&server), CONTRACT);
    let err = reader.lookup(&fp()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransientNetwork);

    // Truncated result must not be read as "uncertified".
    let server = MockServer::start().await;
    mount(&server, "eth_call", ok(json!("0x1234"))).await;
    let reader = RpcLedgerReader::new(client(&server), CONTRACT);
    let err = reader.lookup(&fp()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransientNetwork);
}

#[tokio::test]
async fn test_lookup_unreachable() {
    let rpc = JsonRpcClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
    let reader = RpcLedgerReader::new(rpc, CONTRACT);
    let err = reader.lookup(&fp()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransientNetwork);
}

// ============================================================================
// Signer
// ============================================================================

#[tokio::test]
async fn test_request_session() {
    let server = MockServer::start().await;
    mount(&server, "eth_requestAccounts", ok(json!([AUTHOR.to_hex()]))).await;

    let signer = RpcSigningProvider::new(client(&server), classifier());
    assert_eq!(signer.request_session().await.unwrap(), AUTHOR);
}

#[tokio::test]
async fn test_request_session_rejected() {
    let server = MockServer::start().await;
    mount(&server, "eth_requestAccounts", rpc_error(4001, "User rejected the request.", None)).await;

    let signer = RpcSigningProvider::new(client(&server), classifier());
    let err = signer.request_session().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UserCancelled);
}

#[tokio::test]
async fn test_ensure_network_already_on_chain() {
    let server = MockServer::start().await;
    let chain = ChainParams::polygon_amoy();
    mount(&server, "eth_chainId", ok(json!(chain.chain_id_hex()))).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "wallet_switchEthereumChain"})))
        .respond_with(ok(Value::Null))
        .expect(0)
        .mount(&server)
        .await;

    let signer = RpcSigningProvider::new(client(&server), classifier());
    signer.ensure_network(&chain).await.unwrap();
}

#[tokio::test]
async fn test_ensure_network_provisions_unknown_chain() {
    let server = MockServer::start().await;
    let chain = ChainParams::polygon_amoy();
    mount(&server, "eth_chainId", ok(json!("0x1"))).await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "wallet_switchEthereumChain"})))
        .respond_with(rpc_error(4902, "Unrecognized chain ID", None))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "wallet_switchEthereumChain"})))
        .respond_with(ok(Value::Null))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "wallet_addEthereumChain",
            "params": [{"chainId": chain.chain_id_hex()}],
        })))
        .respond_with(ok(Value::Null))
        .expect(1)
        .mount(&server)
        .await;

    let signer = RpcSigningProvider::new(client(&server), classifier());
    signer.ensure_network(&chain).await.unwrap();
}

// ============================================================================
// Writes
// ============================================================================

fn writer(server: &MockServer) -> RpcLedgerWriter {
    let signer = Arc::new(RpcSigningProvider::new(client(server), classifier()));
    RpcLedgerWriter::new(signer, CONTRACT, 2_000_000)
}

#[tokio::test]
async fn test_submit_sends_certify_transaction() {
    let server = MockServer::start().await;
    let data = abi::to_hex_data(&abi::encode_certify(&fp()));
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_sendTransaction",
            "params": [{"from": AUTHOR.to_hex(), "to": CONTRACT.to_hex(), "data": data, "gas": "0x1e8480"}],
        })))
        .respond_with(ok(json!(TxHash::from_bytes([0x77; 32]).to_hex())))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::new(Principal::Authenticated(AUTHOR));
    let handle = writer(&server).submit(&fp(), &session).await.unwrap();
    assert_eq!(handle, self::handle());
}

#[tokio::test]
async fn test_submit_anonymous_never_calls_signer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ok(Value::Null))
        .expect(0)
        .mount(&server)
        .await;

    let err = writer(&server).submit(&fp(), &Session::anonymous()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_submit_signer_failures() {
    let session = Session::new(Principal::Authenticated(AUTHOR));

    let server = MockServer::start().await;
    mount(&server, "eth_sendTransaction", rpc_error(4001, "User denied transaction signature.", None)).await;
    let err = writer(&server).submit(&fp(), &session).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UserCancelled);

    let server = MockServer::start().await;
    mount(
        &server,
        "eth_sendTransaction",
        rpc_error(-32000, "insufficient funds for gas * price + value", None),
    )
    .await;
    let err = writer(&server).submit(&fp(), &session).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientResource);

    let server = MockServer::start().await;
    let revert = abi::to_hex_data(&abi::encode_revert_reason("Imagen ya certificada"));
    mount(&server, "eth_sendTransaction", rpc_error(3, "execution reverted", Some(json!(revert)))).await;
    let err = writer(&server).submit(&fp(), &session).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyCertified);
}

// ============================================================================
// Confirmation
// ============================================================================

#[tokio::test]
async fn test_confirmation_reads_event() {
    let server = MockServer::start().await;
    mount(
        &server,
        "eth_getTransactionReceipt",
        ok(json!({
            "status": "0x1",
            "blockNumber": "0x10",
            "logs": [certified_log(&fp(), &AUTHOR, 1_715_000_123)],
        })),
    )
    .await;
    mount(&server, "eth_blockNumber", ok(json!("0x11"))).await;

    let record = tracker(&server, 2, 5).wait(&handle()).await.unwrap();
    assert_eq!(record.fingerprint, fp());
    assert_eq!(record.author, AUTHOR);
    assert_eq!(record.timestamp, 1_715_000_123);
}

#[tokio::test]
async fn test_confirmation_falls_back_to_block_time() {
    let server = MockServer::start().await;
    mount(
        &server,
        "eth_getTransactionReceipt",
        ok(json!({"status": "0x1", "blockNumber": "0x10", "logs": []})),
    )
    .await;
    mount(&server, "eth_blockNumber", ok(json!("0x10"))).await;
    mount(&server, "eth_getBlockByNumber", ok(json!({"timestamp": "0x6643a0c0"}))).await;

    let record = tracker(&server, 1, 5).wait(&handle()).await.unwrap();
    assert_eq!(record.timestamp, 0x6643_a0c0);
    assert_eq!(record.author, AUTHOR);
}

#[tokio::test]
async fn test_confirmation_waits_for_receipt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getTransactionReceipt"})))
        .respond_with(ok(Value::Null))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    mount(
        &server,
        "eth_getTransactionReceipt",
        ok(json!({
            "status": "0x1",
            "blockNumber": "0x20",
            "logs": [certified_log(&fp(), &AUTHOR, 42)],
        })),
    )
    .await;
    mount(&server, "eth_getTransactionByHash", ok(json!({"hash": handle().hash.to_hex()}))).await;
    mount(&server, "eth_blockNumber", ok(json!("0x20"))).await;

    let record = tracker(&server, 1, 0).wait(&handle()).await.unwrap();
    assert_eq!(record.timestamp, 42);
}

#[tokio::test]
async fn test_confirmation_revert_lost_race() {
    let server = MockServer::start().await;
    mount(
        &server,
        "eth_getTransactionReceipt",
        ok(json!({"status": "0x0", "blockNumber": "0x10", "logs": []})),
    )
    .await;
    let revert = abi::to_hex_data(&abi::encode_revert_reason("Imagen ya certificada"));
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_call", "params": [{}, "0x10"]})))
        .respond_with(rpc_error(3, "execution reverted", Some(json!(revert))))
        .mount(&server)
        .await;

    let err = tracker(&server, 1, 5).wait(&handle()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyCertified);
}

#[tokio::test]
async fn test_confirmation_other_revert_is_network() {
    let server = MockServer::start().await;
    mount(
        &server,
        "eth_getTransactionReceipt",
        ok(json!({"status": "0x0", "blockNumber": "0x10", "logs": []})),
    )
    .await;
    mount(&server, "eth_call", rpc_error(-32000, "out of gas", None)).await;

    let err = tracker(&server, 1, 5).wait(&handle()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransientNetwork);
}

#[tokio::test]
async fn test_confirmation_dropped_transaction() {
    let server = MockServer::start().await;
    mount(&server, "eth_getTransactionReceipt", ok(Value::Null)).await;
    mount(&server, "eth_getTransactionByHash", ok(Value::Null)).await;

    let err = tracker(&server, 1, 2).wait(&handle()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransientNetwork);
    assert!(err.to_string().contains("dropped"));
}

#[tokio::test]
async fn test_confirmation_poll_failure_is_network() {
    let server = MockServer::start().await;
    mount(&server, "eth_getTransactionReceipt", ResponseTemplate::new(502)).await;

    let err = tracker(&server, 1, 5).wait(&handle()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransientNetwork);
}
