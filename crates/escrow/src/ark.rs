//! Ark wallet capability: the [`ArkClient`] trait and its REST
//! implementation.
//!
//! The Ark layer's signing and settlement machinery is opaque to this
//! service; the escrow only needs four capabilities -- send sats to an
//! address, enumerate its own VTXOs, read its balance, and expose a
//! boarding address for on-chain top-ups. [`ArkClient`] is a trait so the
//! engine tests run against an in-memory wallet, and [`RestArkClient`] is
//! the concrete implementation speaking JSON over HTTP to the operator.

use serde::Deserialize;
use tracing::debug;

use punks_core::VtxoOutpoint;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One virtual UTXO inside a wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vtxo {
    /// Current outpoint (volatile across refresh rounds).
    pub outpoint: VtxoOutpoint,
    /// Value in satoshis.
    pub amount: u64,
    /// Whether the VTXO has been spent.
    pub is_spent: bool,
}

/// Errors from Ark wallet communication.
#[derive(Debug)]
pub enum ArkClientError {
    /// The HTTP request failed (network, TLS).
    RequestFailed(String),
    /// The operator returned a non-2xx status code.
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Response body (best-effort).
        body: String,
    },
    /// The response body could not be parsed as expected JSON.
    ParseError(String),
    /// The send exceeded its deadline; the outcome is unknown.
    Timeout,
}

impl std::fmt::Display for ArkClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestFailed(detail) => write!(f, "ark request failed: {detail}"),
            Self::ApiError { status, body } => {
                write!(f, "ark api error: status={status} body={body}")
            }
            Self::ParseError(detail) => write!(f, "ark parse error: {detail}"),
            Self::Timeout => write!(f, "ark send deadline exceeded"),
        }
    }
}

impl std::error::Error for ArkClientError {}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// The wallet capability the escrow engine runs against.
pub trait ArkClient: Send + Sync {
    /// Sends sats to an Ark address, returning the txid.
    fn send(
        &self,
        address: &str,
        amount_sats: u64,
    ) -> impl std::future::Future<Output = Result<String, ArkClientError>> + Send;

    /// Enumerates the wallet's VTXOs (spent ones included, flagged).
    fn get_vtxos(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Vtxo>, ArkClientError>> + Send;

    /// The wallet's spendable balance in sats.
    fn get_balance(&self)
    -> impl std::future::Future<Output = Result<u64, ArkClientError>> + Send;

    /// A boarding address for on-chain top-ups.
    fn get_boarding_address(
        &self,
    ) -> impl std::future::Future<Output = Result<String, ArkClientError>> + Send;
}

// ---------------------------------------------------------------------------
// REST implementation
// ---------------------------------------------------------------------------

/// Ark wallet client over the operator's REST API.
///
/// Initialised once with the base URL and the escrow wallet's address;
/// reused for all calls.
pub struct RestArkClient {
    base_url: String,
    wallet_address: String,
    /// Bearer credential for the wallet daemon, when it requires one.
    wallet_key: Option<String>,
    http: reqwest::Client,
}

impl RestArkClient {
    /// Creates a client for one wallet against one operator.
    pub fn new(base_url: &str, wallet_address: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            wallet_address: wallet_address.to_owned(),
            wallet_key: None,
            http: reqwest::Client::new(),
        }
    }

    /// Attaches the wallet daemon credential to every request.
    pub fn with_wallet_key(mut self, key: impl Into<String>) -> Self {
        self.wallet_key = Some(key.into());
        self
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.wallet_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ArkClientError> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "ark GET");

        let resp = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .map_err(|e| ArkClientError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ArkClientError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| ArkClientError::ParseError(e.to_string()))
    }
}

#[derive(Deserialize)]
struct SendResponse {
    txid: String,
}

#[derive(Deserialize)]
struct BalanceResponse {
    #[serde(rename = "availableSats")]
    available_sats: u64,
}

#[derive(Deserialize)]
struct BoardingResponse {
    address: String,
}

#[derive(Deserialize)]
struct VtxoDto {
    txid: String,
    vout: u32,
    #[serde(rename = "amountSats")]
    amount_sats: u64,
    #[serde(rename = "isSpent", default)]
    is_spent: bool,
}

impl ArkClient for RestArkClient {
    async fn send(&self, address: &str, amount_sats: u64) -> Result<String, ArkClientError> {
        let url = format!("{}/v1/wallet/send", self.base_url);
        debug!(%url, address, amount_sats, "ark send");

        let resp = self
            .authorize(self.http.post(&url))
            .json(&serde_json::json!({
                "from": self.wallet_address,
                "to": address,
                "amountSats": amount_sats,
            }))
            .send()
            .await
            .map_err(|e| ArkClientError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ArkClientError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let body: SendResponse = resp
            .json()
            .await
            .map_err(|e| ArkClientError::ParseError(e.to_string()))?;
        Ok(body.txid)
    }

    async fn get_vtxos(&self) -> Result<Vec<Vtxo>, ArkClientError> {
        let dtos: Vec<VtxoDto> = self
            .get_json(&format!("/v1/wallet/{}/vtxos", self.wallet_address))
            .await?;

        let mut vtxos = Vec::with_capacity(dtos.len());
        for dto in dtos {
            let outpoint = VtxoOutpoint::new(&dto.txid, dto.vout)
                .map_err(|e| ArkClientError::ParseError(e.to_string()))?;
            vtxos.push(Vtxo {
                outpoint,
                amount: dto.amount_sats,
                is_spent: dto.is_spent,
            });
        }
        Ok(vtxos)
    }

    async fn get_balance(&self) -> Result<u64, ArkClientError> {
        let body: BalanceResponse = self
            .get_json(&format!("/v1/wallet/{}/balance", self.wallet_address))
            .await?;
        Ok(body.available_sats)
    }

    async fn get_boarding_address(&self) -> Result<String, ArkClientError> {
        let body: BoardingResponse = self
            .get_json(&format!("/v1/wallet/{}/boarding", self.wallet_address))
            .await?;
        Ok(body.address)
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation (tests, dry runs)
// ---------------------------------------------------------------------------

/// An in-memory Ark wallet for engine tests and dry runs.
///
/// Holds a balance and a VTXO set behind a shared mutex; sends append to
/// a transcript and can be forced to fail to exercise the engine's
/// failure ordering. `Clone` shares the state, so a test can keep a
/// handle after moving a clone into the engine.
#[derive(Clone, Default)]
pub struct MemoryArkClient {
    state: std::sync::Arc<std::sync::Mutex<MemoryWalletState>>,
}

#[derive(Default)]
struct MemoryWalletState {
    balance: u64,
    vtxos: Vec<Vtxo>,
    sent: Vec<(String, u64)>,
    fail_sends: bool,
    next_txid: u64,
}

impl MemoryArkClient {
    /// An empty wallet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the spendable balance.
    pub fn set_balance(&self, sats: u64) {
        self.state.lock().unwrap().balance = sats;
    }

    /// Adds a VTXO to the wallet.
    pub fn add_vtxo(&self, outpoint: VtxoOutpoint, amount: u64) {
        self.state.lock().unwrap().vtxos.push(Vtxo {
            outpoint,
            amount,
            is_spent: false,
        });
    }

    /// Makes subsequent sends fail (or succeed again).
    pub fn fail_sends(&self, fail: bool) {
        self.state.lock().unwrap().fail_sends = fail;
    }

    /// Snapshot of `(address, sats)` sends so far.
    pub fn sent(&self) -> Vec<(String, u64)> {
        self.state.lock().unwrap().sent.clone()
    }
}

impl ArkClient for MemoryArkClient {
    async fn send(&self, address: &str, amount_sats: u64) -> Result<String, ArkClientError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_sends {
            return Err(ArkClientError::ApiError {
                status: 500,
                body: "forced failure".to_owned(),
            });
        }
        state.balance = state.balance.saturating_sub(amount_sats);
        state.sent.push((address.to_owned(), amount_sats));
        state.next_txid += 1;
        Ok(format!("memtx-{:04}", state.next_txid))
    }

    async fn get_vtxos(&self) -> Result<Vec<Vtxo>, ArkClientError> {
        Ok(self.state.lock().unwrap().vtxos.clone())
    }

    async fn get_balance(&self) -> Result<u64, ArkClientError> {
        Ok(self.state.lock().unwrap().balance)
    }

    async fn get_boarding_address(&self) -> Result<String, ArkClientError> {
        Ok("bc1pmemoryboarding".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalised() {
        let client = RestArkClient::new("http://localhost:7070/", "ark1escrow");
        assert_eq!(client.base_url, "http://localhost:7070");
    }

    #[test]
    fn vtxo_dto_parses_operator_shape() {
        let json = format!(
            r#"[{{"txid":"{}","vout":1,"amountSats":10000,"isSpent":false}},
                {{"txid":"{}","vout":0,"amountSats":500}}]"#,
            "ab".repeat(32),
            "cd".repeat(32),
        );
        let dtos: Vec<VtxoDto> = serde_json::from_str(&json).unwrap();
        assert_eq!(dtos.len(), 2);
        assert_eq!(dtos[0].amount_sats, 10_000);
        assert!(!dtos[1].is_spent, "isSpent defaults to false");
    }
}
