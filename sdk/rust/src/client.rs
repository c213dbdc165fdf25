use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

/// Column as reported by the proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// Successful query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableResponse {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Optional query parameters; `None` leaves the proxy default in place.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub locale_identifier: Option<i32>,
    pub application_name: Option<String>,
    pub timeout: Option<i32>,
    /// Send the query as the `query` URI parameter instead of the body.
    pub query_in_uri: bool,
}

pub struct ProxyClient {
    client: Client,
    proxy_url: String,
}

impl ProxyClient {
    pub fn new(proxy_url: &str) -> Self {
        Self {
            client: Client::builder()
                .pool_max_idle_per_host(0)
                .no_proxy()
                .build()
                .unwrap_or_default(),
            proxy_url: proxy_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the usage hint (no credentials).
    pub async fn usage(&self) -> Result<String, reqwest::Error> {
        self.client
            .get(format!("{}/", self.proxy_url))
            .send()
            .await?
            .text()
            .await
    }

    /// Send a query and return the raw response, whatever its status.
    pub async fn query_raw(
        &self,
        server: &str,
        db: &str,
        query: &str,
        credentials: Option<(&str, &str)>,
        options: &QueryOptions,
    ) -> Result<Response, reqwest::Error> {
        let mut params: Vec<(&str, String)> = vec![("server", server.to_string()), ("db", db.to_string())];
        if let Some(locale) = options.locale_identifier {
            params.push(("localeIdentifier", locale.to_string()));
        }
        if let Some(app_name) = &options.application_name {
            params.push(("applicationName", app_name.clone()));
        }
        if let Some(timeout) = options.timeout {
            params.push(("timeout", timeout.to_string()));
        }
        if options.query_in_uri {
            params.push(("query", query.to_string()));
        }

        let mut request = self
            .client
            .post(format!("{}/", self.proxy_url))
            .query(&params);
        if let Some((user, password)) = credentials {
            request = request.basic_auth(user, Some(password));
        }
        if !options.query_in_uri {
            request = request.body(query.to_string());
        }

        request.send().await
    }

    /// Send a query and decode the table.
    pub async fn query(
        &self,
        server: &str,
        db: &str,
        query: &str,
        user: &str,
        password: &str,
    ) -> Result<TableResponse, Box<dyn std::error::Error + Send + Sync>> {
        let resp = self
            .query_raw(server, db, query, Some((user, password)), &QueryOptions::default())
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(format!("Proxy returned error status {}: {}", status, text).into());
        }

        Ok(serde_json::from_str::<TableResponse>(&text)?)
    }
}
