//! RPC request handlers.

use axum::body::Body;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::Response;
use axum::Json;
use futures_util::stream;
use serde::{Deserialize, Serialize};

use keel_chain::{
    merkle_prove, merkle_verify, tx_merkle_tree, tx_pair_hash, ProofStep, SearchTx, SigBlock,
    SigTx, Tx,
};
use keel_crypto::Account;
use keel_types::{Address, Hash};

use crate::error::RpcError;
use crate::server::RpcState;

/// Minimum accepted password length, enforced at this boundary.
const MIN_PASSWORD_LEN: usize = 5;

// ── Account ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AccountCreateRequest {
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct AccountCreateResponse {
    pub address: String,
}

pub async fn account_create(
    State(state): State<RpcState>,
    Json(req): Json<AccountCreateRequest>,
) -> Result<Json<AccountCreateResponse>, RpcError> {
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(RpcError::InvalidArgument(format!(
            "password must be at least {MIN_PASSWORD_LEN} bytes"
        )));
    }
    let account = Account::generate();
    account
        .write_to_dir(&state.key_store_dir, req.password.as_bytes())
        .map_err(|e| RpcError::Internal(format!("failed to write account: {e}")))?;
    tracing::info!(address = %account.address(), "account created");
    Ok(Json(AccountCreateResponse {
        address: account.address().to_string(),
    }))
}

#[derive(Deserialize)]
pub struct AccountBalanceRequest {
    pub address: String,
}

#[derive(Serialize, Deserialize)]
pub struct AccountBalanceResponse {
    pub balance: u64,
}

pub async fn account_balance(
    State(state): State<RpcState>,
    Json(req): Json<AccountBalanceRequest>,
) -> Result<Json<AccountBalanceResponse>, RpcError> {
    let address: Address = req
        .address
        .parse()
        .map_err(|_| RpcError::InvalidArgument("malformed address".to_string()))?;
    match state.balance_checker.balance(&address) {
        Some(balance) => Ok(Json(AccountBalanceResponse { balance })),
        None => Err(RpcError::NotFound(format!("account {}", req.address))),
    }
}

// ── Transaction ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct TxSignRequest {
    pub from: String,
    pub to: String,
    pub value: u64,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct TxSignResponse {
    pub tx: SigTx,
}

pub async fn tx_sign(
    State(state): State<RpcState>,
    Json(req): Json<TxSignRequest>,
) -> Result<Json<TxSignResponse>, RpcError> {
    let from: Address = req
        .from
        .parse()
        .map_err(|_| RpcError::InvalidArgument("malformed from address".to_string()))?;
    let to: Address = req
        .to
        .parse()
        .map_err(|_| RpcError::InvalidArgument("malformed to address".to_string()))?;

    let path = state.key_store_dir.join(&req.from);
    let account = Account::read_from_file(&path, req.password.as_bytes())
        .map_err(|e| RpcError::InvalidArgument(e.to_string()))?;

    let nonce = state.tx_applier.nonce(&from) + 1;
    let stx = Tx::new(from, to, req.value, nonce)
        .sign(&account)
        .map_err(|e| RpcError::Internal(e.to_string()))?;
    Ok(Json(TxSignResponse { tx: stx }))
}

#[derive(Deserialize)]
pub struct TxSendRequest {
    pub tx: SigTx,
}

#[derive(Serialize, Deserialize)]
pub struct TxSendResponse {
    pub hash: String,
}

pub async fn tx_send(
    State(state): State<RpcState>,
    Json(req): Json<TxSendRequest>,
) -> Result<Json<TxSendResponse>, RpcError> {
    let hash = req.tx.hash();
    state
        .tx_applier
        .apply_tx(req.tx.clone())
        .map_err(|e| RpcError::FailedPrecondition(e.to_string()))?;
    state.tx_relay.relay(req.tx).await;
    Ok(Json(TxSendResponse {
        hash: hash.to_string(),
    }))
}

#[derive(Deserialize, Default)]
pub struct TxSearchRequest {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub account: String,
}

impl TxSearchRequest {
    fn matches(&self, stx: &SigTx) -> bool {
        let from = stx.tx.from.to_string();
        let to = stx.tx.to.to_string();
        !self.from.is_empty() && from.starts_with(&self.from)
            || !self.to.is_empty() && to.starts_with(&self.to)
            || !self.account.is_empty()
                && (from.starts_with(&self.account) || to.starts_with(&self.account))
    }
}

/// Stream matching transactions as newline-delimited JSON. A hash match is
/// unique and short-circuits the scan.
pub async fn tx_search(
    State(state): State<RpcState>,
    Json(req): Json<TxSearchRequest>,
) -> Result<Response, RpcError> {
    let blocks = state
        .block_store
        .read_blocks()
        .map_err(|e| RpcError::NotFound(e.to_string()))?;

    let mut lines: Vec<String> = Vec::new();
    'scan: for result in blocks {
        let blk = result.map_err(|e| RpcError::Internal(e.to_string()))?;
        let blk_hash = blk.hash();
        for stx in &blk.block.txs {
            let by_hash =
                !req.hash.is_empty() && stx.hash().to_string().starts_with(&req.hash);
            if by_hash || req.matches(stx) {
                let found = SearchTx::new(
                    stx.clone(),
                    blk.block.number,
                    blk_hash,
                    blk.block.merkle_root,
                );
                let mut line = serde_json::to_string(&found)
                    .map_err(|e| RpcError::Internal(e.to_string()))?;
                line.push('\n');
                lines.push(line);
                if by_hash {
                    break 'scan;
                }
            }
        }
    }

    let body = Body::from_stream(stream::iter(
        lines.into_iter().map(Ok::<_, std::convert::Infallible>),
    ));
    Response::builder()
        .header(CONTENT_TYPE, "application/x-ndjson")
        .body(body)
        .map_err(|e| RpcError::Internal(e.to_string()))
}

#[derive(Deserialize)]
pub struct TxProveRequest {
    pub hash: String,
}

#[derive(Serialize, Deserialize)]
pub struct TxProveResponse {
    pub merkle_proof: Vec<ProofStep<Hash>>,
}

/// Locate the block containing the transaction, rebuild its Merkle tree,
/// and emit the inclusion proof.
pub async fn tx_prove(
    State(state): State<RpcState>,
    Json(req): Json<TxProveRequest>,
) -> Result<Json<TxProveResponse>, RpcError> {
    let blocks = state
        .block_store
        .read_blocks()
        .map_err(|e| RpcError::NotFound(e.to_string()))?;

    for result in blocks {
        let blk = result.map_err(|e| RpcError::Internal(e.to_string()))?;
        for stx in &blk.block.txs {
            if stx.hash().to_string() == req.hash {
                let tree = tx_merkle_tree(&blk.block.txs)
                    .map_err(|e| RpcError::Internal(e.to_string()))?;
                let merkle_proof = merkle_prove(stx.hash(), &tree)
                    .map_err(|e| RpcError::Internal(e.to_string()))?;
                return Ok(Json(TxProveResponse { merkle_proof }));
            }
        }
    }
    Err(RpcError::NotFound(format!("transaction {}", req.hash)))
}

#[derive(Deserialize)]
pub struct TxVerifyRequest {
    pub hash: String,
    pub merkle_proof: Vec<ProofStep<Hash>>,
    pub merkle_root: String,
}

#[derive(Serialize, Deserialize)]
pub struct TxVerifyResponse {
    pub valid: bool,
}

/// Stateless proof verification against a supplied root.
pub async fn tx_verify(
    Json(req): Json<TxVerifyRequest>,
) -> Result<Json<TxVerifyResponse>, RpcError> {
    let hash: Hash = req
        .hash
        .parse()
        .map_err(|_| RpcError::InvalidArgument("malformed transaction hash".to_string()))?;
    let root: Hash = req
        .merkle_root
        .parse()
        .map_err(|_| RpcError::InvalidArgument("malformed merkle root".to_string()))?;
    let valid = merkle_verify(hash, &req.merkle_proof, root, tx_pair_hash);
    Ok(Json(TxVerifyResponse { valid }))
}

// ── Block ────────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct BlockSearchRequest {
    #[serde(default)]
    pub number: u64,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub parent: String,
}

#[derive(Serialize, Deserialize)]
pub struct BlockSearchResponse {
    pub block: SigBlock,
}

/// Find at most one block by number, hash prefix, or parent prefix.
pub async fn block_search(
    State(state): State<RpcState>,
    Json(req): Json<BlockSearchRequest>,
) -> Result<Json<BlockSearchResponse>, RpcError> {
    let blocks = state
        .block_store
        .read_blocks()
        .map_err(|e| RpcError::NotFound(e.to_string()))?;

    for result in blocks {
        let blk = result.map_err(|e| RpcError::Internal(e.to_string()))?;
        let by_number = req.number != 0 && blk.block.number == req.number;
        let by_hash = !req.hash.is_empty() && blk.hash().to_string().starts_with(&req.hash);
        let by_parent =
            !req.parent.is_empty() && blk.block.parent.to_string().starts_with(&req.parent);
        if by_number || by_hash || by_parent {
            return Ok(Json(BlockSearchResponse { block: blk }));
        }
    }
    Err(RpcError::NotFound("no matching block".to_string()))
}
