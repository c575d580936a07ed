
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use assert_matches::assert_matches;
use ec_executor::ExecutorError;
use ec_rpc::requests::{
    ETH_CALL, ETH_GET_BALANCE, ETH_GET_BLOCK_BY_NUMBER, ETH_GET_TRANSACTION_RECEIPT, TRACE_BLOCK,
};
use ec_sink::{MemorySink, Sink};
use ec_sync::StreamerAdapter;
use ep_record::identity::{ITEM_ID, ITEM_TIMESTAMP};
use ep_record::{json, BlockRange, EntityType, Record, Value};
use rstest::rstest;

use self::chain::*;
use crate::jobs::{balances::INVALID_BALANCE, receipts::MISSING_RECEIPT};
use crate::{DependencyGraph, EthStreamerAdapter, ExportError, ExportOptions, Producer};

fn range() -> BlockRange {
    BlockRange::new(1, HEAD).unwrap()
}

fn of_kind(records: &[Record], kind: EntityType) -> Vec<&Record> {
    records.iter().filter(|r| r.kind == kind).collect()
}

#[rstest]
#[case::keep_transactions_without_receipt(false, 7)]
#[case::skip_transactions_without_receipt(true, 5)]
#[tokio::test]
async fn missing_receipts_become_error_records(#[case] skip_none_receipts: bool, #[case] expected_txs: usize) {
    let transport = transport();
    let planner = planner(&transport, ExportOptions { skip_none_receipts });

    let records = planner
        .export_all(range(), &[EntityType::Block, EntityType::Transaction, EntityType::Error])
        .await
        .unwrap();

    assert_eq!(of_kind(&records, EntityType::Block).len(), 3);
    assert_eq!(of_kind(&records, EntityType::Transaction).len(), expected_txs);

    let errors = of_kind(&records, EntityType::Error);
    assert_eq!(errors.len(), 2);
    let failing: HashSet<_> =
        errors.iter().filter_map(|e| e.get("data").unwrap()["transaction_hash"].as_str()).collect();
    assert_eq!(failing, HashSet::from(MISSING_RECEIPTS));
    assert!(errors.iter().all(|e| e.get_str("kind") == Some(MISSING_RECEIPT)));

    // Receipts are fetched for enrichment even though they were not requested.
    assert!(of_kind(&records, EntityType::Receipt).is_empty());
    assert_eq!(transport.count_method(ETH_GET_TRANSACTION_RECEIPT), 7);
}

#[tokio::test]
async fn transactions_are_enriched_with_receipt_fields() {
    let transport = transport();
    let planner = planner(&transport, ExportOptions::default());

    let records = planner.export_all(range(), &[EntityType::Transaction]).await.unwrap();

    let tx = records.iter().find(|r| r.get_str("hash") == Some("0xt11")).unwrap();
    assert_eq!(tx.get("receipt_status"), Some(&json!(1)));
    assert_eq!(tx.get("receipt_cumulative_gas_used"), Some(&json!(42_000)));
    assert_eq!(tx.get("receipt_effective_gas_price"), Some(&json!("1000000000")));
    assert_eq!(tx.get("value"), Some(&json!("1000000000000000000")));

    let missing = records.iter().find(|r| r.get_str("hash") == Some("0xt20")).unwrap();
    assert_eq!(missing.get("receipt_status"), Some(&Value::Null));
}

#[tokio::test]
async fn records_are_ordered_and_stamped() {
    let transport = transport();
    let planner = planner(&transport, ExportOptions::default());

    let records = planner.export_all(range(), &EntityType::ALL).await.unwrap();

    let kinds: Vec<EntityType> = records.iter().map(|r| r.kind).collect();
    let mut sorted = kinds.clone();
    sorted.sort();
    assert_eq!(kinds, sorted);

    let blocks: Vec<_> = of_kind(&records, EntityType::Block).iter().map(|b| b.get_u64("number").unwrap()).collect();
    assert_eq!(blocks, vec![1, 2, 3]);
    let first = &records[0];
    assert_eq!(first.get(ITEM_ID), Some(&json!("block_0xb1")));
    assert_eq!(first.get(ITEM_TIMESTAMP), Some(&json!("2023-11-14T22:13:32Z")));

    for record in &records {
        assert!(record.get(ITEM_ID).is_some_and(Value::is_string), "{record:?}");
        let timeless = record.kind.is_timeless();
        assert_eq!(record.get(ITEM_TIMESTAMP).is_some_and(Value::is_string), !timeless, "{record:?}");
    }
}

#[tokio::test]
async fn token_balance_closure_runs_each_producer_once() {
    let transport = transport();
    let planner = planner(&transport, ExportOptions::default());
    let mut session = planner.session(range());

    let balances = session.export(EntityType::TokenBalance).await.unwrap();

    assert_eq!(
        session.executed(),
        &[Producer::BlocksAndTransactions, Producer::ReceiptsAndLogs, Producer::TokenTransfers, Producer::TokenBalances]
    );
    assert_eq!(transport.count_method(ETH_GET_BLOCK_BY_NUMBER), 3);
    assert_eq!(transport.count_method(ETH_GET_TRANSACTION_RECEIPT), 7);
    assert_eq!(transport.count_method(TRACE_BLOCK), 0);

    // Alice sent tokens to Bob in block 1.
    let holders: HashSet<_> = balances.iter().map(|b| b.get_str("holder_address").unwrap().to_string()).collect();
    assert_eq!(holders, HashSet::from([ALICE.to_string(), BOB.to_string()]));
    assert!(balances.iter().all(|b| b.get("value") == Some(&json!("5"))));

    // Siblings and dependencies are served from the memo table.
    session.export(EntityType::Receipt).await.unwrap();
    session.export(EntityType::Transaction).await.unwrap();
    assert_eq!(session.executed().len(), 4);
    assert_eq!(transport.count_method(ETH_GET_BLOCK_BY_NUMBER), 3);
}

#[tokio::test]
async fn contracts_and_tokens_from_create_traces() {
    let transport = transport();
    let planner = planner(&transport, ExportOptions::default());

    let records = planner.export_all(range(), &[EntityType::Contract, EntityType::Token]).await.unwrap();

    let contracts = of_kind(&records, EntityType::Contract);
    assert_eq!(contracts.len(), 1);
    assert_eq!(contracts[0].get_str("address"), Some(DEPLOYED));
    assert_eq!(contracts[0].get_str("block_hash"), Some("0xb2"));
    assert_eq!(contracts[0].get("is_erc20"), Some(&json!(true)));
    assert_eq!(contracts[0].get(ITEM_ID), Some(&json!(format!("contract_2_{DEPLOYED}"))));

    let tokens = of_kind(&records, EntityType::Token);
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].get("symbol"), Some(&json!("TKN")));
    assert_eq!(tokens[0].get("name"), Some(&json!("Token")));
    assert_eq!(tokens[0].get("decimals"), Some(&json!(18)));
    assert_eq!(tokens[0].get("total_supply"), Some(&json!("1000")));
    assert_eq!(tokens[0].get(ITEM_TIMESTAMP), Some(&Value::Null));
}

#[tokio::test]
async fn native_balances_and_internal_transfers() {
    let transport = transport();
    let planner = planner(&transport, ExportOptions::default());

    let records = planner
        .export_all(range(), &[EntityType::NativeBalance, EntityType::InternalTransfer])
        .await
        .unwrap();

    // Alice and Bob at each of the three blocks.
    let balances = of_kind(&records, EntityType::NativeBalance);
    assert_eq!(balances.len(), 6);
    assert!(balances.iter().all(|b| b.get("value") == Some(&json!("16"))));
    assert_eq!(balances[0].get("block_timestamp"), Some(&json!(timestamp(1))));

    // The only trace is a top level create.
    assert!(of_kind(&records, EntityType::InternalTransfer).is_empty());
}

#[tokio::test]
async fn reexport_is_idempotent() {
    let transport = transport();
    let planner = planner(&transport, ExportOptions::default());

    let first = planner.export_all(range(), &EntityType::ALL).await.unwrap();
    let second = planner.export_all(range(), &EntityType::ALL).await.unwrap();

    assert_eq!(first, second);
    let ids: HashSet<_> = first.iter().filter_map(|r| r.get_str(ITEM_ID)).collect();
    assert_eq!(ids.len(), first.len());
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let transport = transport().fail_next(3);
    let planner = planner(&transport, ExportOptions::default());

    let records = planner.export_all(range(), &[EntityType::Block]).await.unwrap();
    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn missing_block_exhausts_retries() {
    let transport = transport();
    let planner = planner(&transport, ExportOptions::default());

    let err = planner.export_all(BlockRange::new(3, 4).unwrap(), &[EntityType::Block]).await.unwrap_err();
    assert_matches!(err, ExportError::Executor(ExecutorError::RetriesExhausted { retries: 5, .. }));
}

#[tokio::test]
async fn reverted_balance_call_becomes_error_record() {
    let transport = ec_rpc::testing::MockTransport::new(|req| match req.method.as_str() {
        ec_rpc::requests::ETH_CALL => {
            Err(ec_rpc::JsonRpcErrorObject { code: 3, message: "execution reverted".into(), data: None })
        }
        _ => handle(req),
    });
    let planner = planner(&transport, ExportOptions::default());

    let records = planner.export_all(range(), &[EntityType::TokenBalance, EntityType::Error]).await.unwrap();

    assert!(of_kind(&records, EntityType::TokenBalance).is_empty());
    let invalid: Vec<_> =
        of_kind(&records, EntityType::Error).into_iter().filter(|e| e.get_str("kind") == Some(INVALID_BALANCE)).collect();
    assert_eq!(invalid.len(), 2);
    assert_eq!(invalid[0].get("data").unwrap()["reason"]["message"], json!("execution reverted"));
}

#[tokio::test]
async fn malformed_native_balance_becomes_error_record() {
    let transport = ec_rpc::testing::MockTransport::new(|req| match req.method.as_str() {
        ETH_GET_BALANCE if req.params[0] == json!(ALICE) => Ok(json!("0xzz")),
        ETH_GET_BALANCE if req.params[1] == json!("0x2") => Ok(Value::Null),
        _ => handle(req),
    });
    let planner = planner(&transport, ExportOptions::default());

    let records = planner.export_all(range(), &[EntityType::NativeBalance, EntityType::Error]).await.unwrap();

    let balances = of_kind(&records, EntityType::NativeBalance);
    let blocks: Vec<_> = balances.iter().map(|b| b.block_number()).collect();
    assert_eq!(blocks, vec![Some(1), Some(3)]);
    assert!(balances.iter().all(|b| b.get_str("address") == Some(BOB)));

    let invalid: Vec<_> =
        of_kind(&records, EntityType::Error).into_iter().filter(|e| e.get_str("kind") == Some(INVALID_BALANCE)).collect();
    assert_eq!(invalid.len(), 4);
    assert!(invalid.iter().all(|e| e.get("data").unwrap()["method"] == json!(ETH_GET_BALANCE)));
    let reasons: HashSet<_> = invalid.iter().map(|e| e.get("data").unwrap()["reason"].to_string()).collect();
    assert_eq!(reasons, HashSet::from(["\"0xzz\"".to_string(), "null".to_string()]));
    let bob_at_2 = invalid.iter().find(|e| e.get("data").unwrap()["address"] == json!(BOB)).unwrap();
    assert_eq!(bob_at_2.get("block_timestamp"), Some(&json!(timestamp(2))));
}

fn header_not_found() -> ec_rpc::JsonRpcErrorObject {
    ec_rpc::JsonRpcErrorObject { code: -32000, message: "header not found".into(), data: None }
}

#[tokio::test]
async fn transient_balance_call_error_exhausts_retries() {
    let transport = ec_rpc::testing::MockTransport::new(|req| match req.method.as_str() {
        ETH_CALL => Err(header_not_found()),
        _ => handle(req),
    });
    let planner = planner(&transport, ExportOptions::default());

    let err = planner.export_all(range(), &[EntityType::TokenBalance, EntityType::Error]).await.unwrap_err();

    assert_matches!(
        err,
        ExportError::Executor(ExecutorError::RetriesExhausted {
            retries: 5,
            source: ec_rpc::RpcError::Rpc { code: -32000, .. }
        })
    );
    assert_eq!(transport.count_method(ETH_CALL), 6 * 2);
}

#[tokio::test]
async fn transient_balance_call_error_is_retried() {
    let failures = AtomicUsize::new(1);
    let transport = ec_rpc::testing::MockTransport::new(move |req| match req.method.as_str() {
        ETH_CALL if failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() => {
            Err(header_not_found())
        }
        _ => handle(req),
    });
    let planner = planner(&transport, ExportOptions::default());

    let records = planner.export_all(range(), &[EntityType::TokenBalance, EntityType::Error]).await.unwrap();

    let balances = of_kind(&records, EntityType::TokenBalance);
    assert_eq!(balances.len(), 2);
    assert!(balances.iter().all(|b| b.get("value") == Some(&json!("5"))));
    assert!(of_kind(&records, EntityType::Error).iter().all(|e| e.get_str("kind") != Some(INVALID_BALANCE)));
}

#[test]
fn cyclic_graph_is_rejected() {
    let transport = transport();
    let graph = DependencyGraph::standard().with_dependency(EntityType::Transaction, EntityType::Log);
    let res = planner(&transport, ExportOptions::default()).with_graph(graph);
    assert_matches!(res.err(), Some(ExportError::Cycle(_)));
}

#[rstest]
#[case::direct(&[EntityType::Trace])]
#[case::transitive(&[EntityType::Contract, EntityType::Block])]
#[tokio::test]
async fn missing_producer_fails_before_extraction(#[case] requested: &[EntityType]) {
    let transport = transport();
    let graph = DependencyGraph::standard().without_producer(EntityType::Trace);
    let planner = planner(&transport, ExportOptions::default()).with_graph(graph).unwrap();

    let err = planner.export_all(range(), requested).await.unwrap_err();

    assert_matches!(err, ExportError::NoProducer(EntityType::Trace));
    assert!(transport.methods().is_empty());
}

#[tokio::test]
async fn missing_receipt_producer_fails_transaction_export() {
    let transport = transport();
    let graph = DependencyGraph::standard().without_producer(EntityType::Receipt);
    let planner = planner(&transport, ExportOptions::default()).with_graph(graph).unwrap();

    let err = planner.export_all(range(), &[EntityType::Transaction]).await.unwrap_err();

    assert_matches!(err, ExportError::NoProducer(EntityType::Receipt));
    assert!(transport.methods().is_empty());
}

#[tokio::test]
async fn adapter_delivers_to_sink() {
    let transport = transport();
    let sink = MemorySink::new();
    let mut adapter = EthStreamerAdapter::new(
        ec_rpc::RpcClient::new(transport.clone()),
        planner(&transport, ExportOptions::default()),
        Box::new(sink.clone()),
        vec![EntityType::Block, EntityType::Log],
    );

    adapter.open().await.unwrap();
    assert_eq!(adapter.get_current_block_number().await.unwrap(), HEAD);
    adapter.export_all(2, 3).await.unwrap();
    adapter.close().await.unwrap();

    let records = sink.records();
    assert_eq!(of_kind(&records, EntityType::Block).len(), 2);
    assert_eq!(of_kind(&records, EntityType::Log).len(), 3);
    assert_eq!(sink.lifecycle(), (1, 1));

    // Closing shuts the executor down for good.
    assert!(adapter.export_all(1, 1).await.is_err());
}

#[tokio::test]
async fn adapter_rejects_inverted_range() {
    let transport = transport();
    let mut sink = MemorySink::new();
    sink.open().await.unwrap();
    let mut adapter = EthStreamerAdapter::new(
        ec_rpc::RpcClient::new(transport.clone()),
        planner(&transport, ExportOptions::default()),
        Box::new(sink),
        vec![EntityType::Block],
    );
    assert!(adapter.export_all(5, 4).await.is_err());
}
