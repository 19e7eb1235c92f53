use sales_core::network::NetworkConnection;
use sales_core::network::protocol::{ClientMessage, ErrorCode, EvaluationPayload, ServerMessage};
use sales_core::network::rpc::{METHODS, UNKNOWN_FIELD};
use sales_core::server::SalesServer;
use sales_core::{QueryEngine, RecordStore, SalesRecord, ServerConfig};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

const DATA: &str = "\
Row ID,Region,State,Category,Customer ID,Product Name,Sales,Quantity,Profit
1,South,Kentucky,Furniture,CG-1,Chair,100,1,10
2,South,Florida,Technology,CG-2,Phone,50,2,-5
3,West,California,Furniture,CG-1,Desk,200,1,20
";

struct TestServer {
    framed: SocketAddr,
    rpc: SocketAddr,
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<sales_core::SalesResult<()>>,
}

async fn start(idle_timeout_secs: u64) -> TestServer {
    let store = RecordStore::from_reader(DATA.as_bytes()).unwrap();
    start_with(store, idle_timeout_secs).await
}

async fn start_with(store: RecordStore, idle_timeout_secs: u64) -> TestServer {
    let engine = Arc::new(QueryEngine::from_store(store));
    let config = ServerConfig {
        framed_port: 0,
        rpc_port: 0,
        idle_timeout_secs,
        ..Default::default()
    };

    let server = SalesServer::bind(&config, engine).await.unwrap();
    let framed = server.framed_addr().unwrap();
    let rpc = server.rpc_addr().unwrap();
    let shutdown = server.shutdown_token();
    let handle = tokio::spawn(server.run());

    TestServer {
        framed,
        rpc,
        shutdown,
        handle,
    }
}

struct RpcClient {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl RpcClient {
    async fn connect(addr: SocketAddr) -> Self {
        let (read, writer) = TcpStream::connect(addr).await.unwrap().into_split();
        Self {
            reader: BufReader::new(read),
            writer,
        }
    }

    async fn send_line(&mut self, line: &str) -> Value {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();

        let mut response = String::new();
        self.reader.read_line(&mut response).await.unwrap();
        serde_json::from_str(&response).unwrap()
    }

    async fn call(&mut self, method: &str, params: Value) -> Value {
        let request = json!({"jsonrpc": "2.0", "method": method, "params": params, "id": 1});
        self.send_line(&request.to_string()).await
    }
}

async fn framed_request(conn: &mut NetworkConnection, message: ClientMessage) -> ServerMessage {
    conn.send_message(&message).await.unwrap();
    conn.read_response().await.unwrap().unwrap()
}

#[tokio::test]
async fn test_both_transports_agree() {
    let server = start(300).await;

    let mut framed = NetworkConnection::new(TcpStream::connect(server.framed).await.unwrap());
    let mut rpc = RpcClient::connect(server.rpc).await;

    // Stats
    let framed_stats = match framed_request(
        &mut framed,
        ClientMessage::GetStats {
            field: "region".to_string(),
        },
    )
    .await
    {
        ServerMessage::Stats { groups } => serde_json::to_value(groups).unwrap(),
        other => panic!("Expected stats, got {:?}", other),
    };
    let rpc_stats = rpc.call("get_stats", json!(["region"])).await;
    assert_eq!(rpc_stats["result"], framed_stats);
    assert_eq!(framed_stats["South"]["sum_sales"], json!(150.0));

    // Records
    let framed_records = match framed_request(
        &mut framed,
        ClientMessage::GetRecordsByField {
            field: "customer_id".to_string(),
            value: "CG-1".to_string(),
        },
    )
    .await
    {
        ServerMessage::Records {
            records,
            total_count,
        } => {
            assert_eq!(total_count, 2);
            serde_json::to_value(records).unwrap()
        }
        other => panic!("Expected records, got {:?}", other),
    };
    let rpc_records = rpc
        .call("get_customer_orders", json!({"customer_id": "CG-1"}))
        .await;
    assert_eq!(rpc_records["result"], framed_records);

    // Aggregates
    match framed_request(
        &mut framed,
        ClientMessage::Evaluate {
            expression: "sum(sales[category = 'Furniture'])".to_string(),
        },
    )
    .await
    {
        ServerMessage::Evaluation {
            result: EvaluationPayload::Sum(total),
        } => assert_eq!(total, 300.0),
        other => panic!("Expected sum, got {:?}", other),
    }
    let rpc_sum = rpc
        .call("evaluate", json!(["sum(sales[category = 'Furniture'])"]))
        .await;
    assert_eq!(rpc_sum["result"], json!({"type": "sum", "value": 300.0}));

    server.shutdown.cancel();
}

#[tokio::test]
async fn test_rpc_session_handles_many_requests() {
    let server = start(300).await;
    let mut rpc = RpcClient::connect(server.rpc).await;

    let methods = rpc.call("system.listMethods", json!([])).await;
    assert_eq!(methods["result"].as_array().unwrap().len(), METHODS.len());

    let top = rpc.call("get_top_products", json!([])).await;
    assert_eq!(top["result"][0], json!({"product": "Desk", "total_sales": 200.0}));

    let error = rpc.call("get_stats", json!(["planet"])).await;
    assert_eq!(error["error"]["code"], json!(UNKNOWN_FIELD));

    let garbage = rpc.send_line("this is not json").await;
    assert_eq!(garbage["error"]["code"], json!(-32700));
    assert_eq!(garbage["id"], Value::Null);

    // The session survives errors.
    let states = rpc.call("get_sales_by_state", Value::Null).await;
    assert_eq!(states["result"].as_array().unwrap().len(), 3);

    server.shutdown.cancel();
}

#[tokio::test]
async fn test_framed_errors_carry_codes() {
    let server = start(300).await;
    let mut framed = NetworkConnection::new(TcpStream::connect(server.framed).await.unwrap());

    match framed_request(
        &mut framed,
        ClientMessage::Evaluate {
            expression: "state > 3".to_string(),
        },
    )
    .await
    {
        ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::TypeMismatch),
        other => panic!("Expected error, got {:?}", other),
    }

    assert_eq!(
        framed_request(&mut framed, ClientMessage::Heartbeat).await,
        ServerMessage::HeartbeatAck
    );

    server.shutdown.cancel();
}

#[tokio::test]
async fn test_oversized_framed_response_is_a_typed_error() {
    let records = (1..=20_000)
        .map(|row_id| SalesRecord {
            row_id,
            product_name: "p".repeat(1000),
            sales: 1.0,
            ..Default::default()
        })
        .collect();
    let server = start_with(RecordStore::from_records(records).unwrap(), 300).await;
    let mut framed = NetworkConnection::new(TcpStream::connect(server.framed).await.unwrap());

    match framed_request(
        &mut framed,
        ClientMessage::Evaluate {
            expression: "sales > 0".to_string(),
        },
    )
    .await
    {
        ServerMessage::Error { code, message } => {
            assert_eq!(code, ErrorCode::InternalError);
            assert!(message.contains("too large"));
        }
        other => panic!("Expected error, got {:?}", other),
    }

    // The session stays open after the rejected response.
    match framed_request(
        &mut framed,
        ClientMessage::Evaluate {
            expression: "count([sales > 0])".to_string(),
        },
    )
    .await
    {
        ServerMessage::Evaluation {
            result: EvaluationPayload::Count(count),
        } => assert_eq!(count, 20_000),
        other => panic!("Expected count, got {:?}", other),
    }

    server.shutdown.cancel();
}

#[tokio::test]
async fn test_idle_framed_connection_is_closed() {
    let server = start(1).await;
    let mut framed = NetworkConnection::new(TcpStream::connect(server.framed).await.unwrap());

    tokio::time::sleep(Duration::from_millis(1500)).await;

    match framed.read_response().await.unwrap() {
        Some(ServerMessage::Error { message, .. }) => {
            assert!(message.contains("inactivity"));
        }
        other => panic!("Expected timeout notice, got {:?}", other),
    }
    assert_eq!(framed.read_response().await.unwrap(), None);

    server.shutdown.cancel();
}

#[tokio::test]
async fn test_shutdown_stops_the_server() {
    let server = start(300).await;
    let mut rpc = RpcClient::connect(server.rpc).await;
    rpc.call("system.listMethods", json!([])).await;

    server.shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());

    // Open sessions are cancelled too.
    let mut line = String::new();
    let read = rpc.reader.read_line(&mut line).await.unwrap();
    assert_eq!(read, 0);
}
