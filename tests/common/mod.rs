//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use mdx_query_proxy::backend::{
    BackendConnection, BackendError, Column, ColumnType, ConnectionDescriptor, QueryBackend, ResultTable,
};
use mdx_query_proxy::config::ProxyConfig;
use mdx_query_proxy::{HttpServer, Shutdown};

pub const USER: &str = "analyst";
pub const PASSWORD: &str = "p@ss:w0rd!";

/// What the in-memory backend does when asked to run a query.
#[derive(Clone)]
pub enum Behaviour {
    Table(ResultTable),
    ConnectError(BackendError),
    QueryError(BackendError),
}

/// Everything the in-memory backend observed.
#[derive(Default)]
pub struct Observed {
    pub connects: AtomicUsize,
    pub releases: AtomicUsize,
    pub descriptors: Mutex<Vec<ConnectionDescriptor>>,
    pub statements: Mutex<Vec<String>>,
}

impl Observed {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// In-memory backend double.
pub struct MockBackend {
    pub observed: Arc<Observed>,
    behaviour: Behaviour,
}

impl MockBackend {
    pub fn new(behaviour: Behaviour) -> (Arc<Self>, Arc<Observed>) {
        let observed = Arc::new(Observed::default());
        let backend = Arc::new(Self {
            observed: observed.clone(),
            behaviour,
        });
        (backend, observed)
    }
}

struct MockConnection {
    observed: Arc<Observed>,
    behaviour: Behaviour,
}

#[async_trait]
impl QueryBackend for MockBackend {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn BackendConnection>, BackendError> {
        self.observed.descriptors.lock().unwrap().push(descriptor.clone());
        if let Behaviour::ConnectError(e) = &self.behaviour {
            return Err(e.clone());
        }
        self.observed.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            observed: self.observed.clone(),
            behaviour: self.behaviour.clone(),
        }))
    }
}

#[async_trait]
impl BackendConnection for MockConnection {
    async fn execute(&mut self, statement: &str) -> Result<ResultTable, BackendError> {
        self.observed.statements.lock().unwrap().push(statement.to_string());
        match &self.behaviour {
            Behaviour::Table(table) => Ok(table.clone()),
            Behaviour::QueryError(e) | Behaviour::ConnectError(e) => Err(e.clone()),
        }
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.observed.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// One row, one column: the answer to `SELECT 1 ON 0 FROM [Cube]`.
pub fn single_cell_table() -> ResultTable {
    let mut table = ResultTable::new(vec![Column::new("[Measures].[Value]", ColumnType::Integer)]);
    table.push_row(vec![json!(1)]);
    table
}

/// `rows` x `cols` table with predictable names and values.
pub fn grid_table(rows: usize, cols: usize) -> ResultTable {
    let columns = (0..cols)
        .map(|c| Column::new(format!("[Measures].[M{}]", c), ColumnType::Integer))
        .collect();
    let mut table = ResultTable::new(columns);
    for r in 0..rows {
        table.push_row((0..cols).map(|c| json!(r * 100 + c)).collect());
    }
    table
}

pub fn test_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.backend.allowed_servers = "PROD1;PROD2".into();
    config
}

/// Start the proxy on an ephemeral port with the given backend.
pub async fn start_proxy(config: ProxyConfig, backend: Arc<dyn QueryBackend>) -> (String, Shutdown) {
    let allow_list = config.allow_list().unwrap();
    let server = HttpServer::with_backend(config, allow_list, backend);
    serve(server).await
}

/// Start the proxy with its real XMLA backend.
pub async fn start_xmla_proxy(config: ProxyConfig) -> (String, Shutdown) {
    let allow_list = config.allow_list().unwrap();
    serve(HttpServer::new(config, allow_list)).await
}

async fn serve(server: HttpServer) -> (String, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (format!("http://{}", addr), shutdown)
}

/// Start a programmable HTTP endpoint standing in for an XMLA server.
///
/// The handler sees the full raw request (head and body) and resolves to a
/// status and a body; it may sleep first to simulate a slow server. Every
/// request is recorded.
pub async fn start_programmable_backend<F, Fut>(f: F) -> (SocketAddr, Arc<Mutex<Vec<String>>>)
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let log = recorded.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                log.lock().unwrap().push(request.clone());

                let (status, body) = f(request).await;
                let status_text = match status {
                    200 => "200 OK",
                    401 => "401 Unauthorized",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, recorded)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let length = header_value(&text[..head_end], "content-length")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + length {
                return Some(text.into_owned());
            }
        }
    }
}

/// Case-insensitive lookup of a header in a raw HTTP request.
pub fn header_value(raw: &str, name: &str) -> Option<String> {
    raw.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_string())
    })
}

pub const CATALOGS_SALES: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>
<DiscoverResponse xmlns="urn:schemas-microsoft-com:xml-analysis"><return>
<root xmlns="urn:schemas-microsoft-com:xml-analysis:rowset" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:sql="urn:schemas-microsoft-com:xml-sql">
<xsd:schema><xsd:complexType name="row"><xsd:sequence>
<xsd:element sql:field="CATALOG_NAME" name="CATALOG_NAME" type="xsd:string" minOccurs="0"/>
</xsd:sequence></xsd:complexType></xsd:schema>
<row><CATALOG_NAME>Sales</CATALOG_NAME></row>
</root></return></DiscoverResponse></soap:Body></soap:Envelope>"#;

pub const CATALOGS_NONE: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>
<DiscoverResponse xmlns="urn:schemas-microsoft-com:xml-analysis"><return>
<root xmlns="urn:schemas-microsoft-com:xml-analysis:rowset" xmlns:xsd="http://www.w3.org/2001/XMLSchema">
<xsd:schema><xsd:complexType name="row"><xsd:sequence>
<xsd:element name="CATALOG_NAME" type="xsd:string" minOccurs="0"/>
</xsd:sequence></xsd:complexType></xsd:schema>
</root></return></DiscoverResponse></soap:Body></soap:Envelope>"#;

pub const EXECUTE_SINGLE_CELL: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>
<ExecuteResponse xmlns="urn:schemas-microsoft-com:xml-analysis"><return>
<root xmlns="urn:schemas-microsoft-com:xml-analysis:rowset" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:sql="urn:schemas-microsoft-com:xml-sql">
<xsd:schema><xsd:complexType name="row"><xsd:sequence>
<xsd:element minOccurs="0" name="_x005B_Measures_x005D_._x005B_Value_x005D_" sql:field="[Measures].[Value]" type="xsd:int"/>
</xsd:sequence></xsd:complexType></xsd:schema>
<row><_x005B_Measures_x005D_._x005B_Value_x005D_>1</_x005B_Measures_x005D_._x005B_Value_x005D_></row>
</root></return></ExecuteResponse></soap:Body></soap:Envelope>"#;

pub const EXECUTE_FAULT: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>
<soap:Fault><faultcode>XMLAnalysisError.0xc10a0004</faultcode><faultstring>Parser error</faultstring>
<detail><Error ErrorCode="3238658057" Description="Query (1, 1) Parser: The syntax for 'SELEC' is incorrect." Source="Analysis Services"/></detail>
</soap:Fault></soap:Body></soap:Envelope>"#;
