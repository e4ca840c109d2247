use super::types::*;
use crate::account::{AccountLedger, KeySet, LifecycleProof, WriteProof};
use crate::crypto::{self, bytes32_hex, parse_bytes32, Bytes32};
use crate::error::LedgerError;
use crate::rpc::RpcState;
use axum::{extract::State, Json};
use serde::de::DeserializeOwned;
use tracing::debug;

const INVALID_PARAMS: i32 = -32602;
const METHOD_NOT_FOUND: i32 = -32601;
const INTERNAL_ERROR: i32 = -32603;
const UNAUTHORIZED: i32 = -32001;
const PRECONDITION_FAILED: i32 = -32002;

/// Main dispatcher: routes incoming JSON-RPC requests to the correct handler.
pub async fn handle_rpc_request(
    State(state): State<RpcState>,
    Json(req): Json<RpcRequest>,
) -> Json<RpcResponse> {
    debug!("RPC Request: method={}, id={}", req.method, req.id);

    let result = match req.method.as_str() {
        "getAccount" => handle_get_account(&state, req.params),
        "createAccount" => handle_create_account(&state, req.params),
        "deleteAccount" => handle_delete_account(&state, req.params),
        "accountExists" => handle_account_exists(&state, req.params),
        "hashLifecycleMessage" => handle_hash_lifecycle_message(req.params),
        "hashReadMessage" => handle_hash_read_message(req.params),
        "applyWrite" => handle_apply_write(&state, req.params),
        "hashWriteMessage" => handle_hash_write_message(req.params),
        "getAuditLog" => to_json(&state.audit_log.events()),
        "getVersion" => Ok(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") })),
        _ => Err(RpcError {
            code: METHOD_NOT_FOUND,
            message: format!("Method not found: {}", req.method),
            data: None,
        }),
    };

    match result {
        Ok(val) => Json(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(val),
            error: None,
            id: req.id,
        }),
        Err(err) => Json(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(err),
            id: req.id,
        }),
    }
}

//
// === Helper Functions ===
//
fn parse_params<T: DeserializeOwned>(params: serde_json::Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(|e| invalid_params(format!("Invalid params: {}", e)))
}

fn invalid_params(message: String) -> RpcError {
    RpcError { code: INVALID_PARAMS, message, data: None }
}

fn parse_salt(salt: &str) -> Result<Bytes32, RpcError> {
    parse_bytes32(salt).map_err(|e| invalid_params(format!("Invalid salt: {}", e)))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError {
        code: INTERNAL_ERROR,
        message: format!("Serialization error: {}", e),
        data: None,
    })
}

/// Named, parameterized error: `data` carries the tagged variant.
fn ledger_error(err: LedgerError) -> RpcError {
    let code = if err.is_authorization() {
        UNAUTHORIZED
    } else {
        match err {
            LedgerError::AccountAlreadyExists { .. }
            | LedgerError::AccountNotFound { .. }
            | LedgerError::WriteAlreadyApplied { .. }
            | LedgerError::Overflow
            | LedgerError::InsufficientFunds => PRECONDITION_FAILED,
            _ => INTERNAL_ERROR,
        }
    };
    RpcError {
        code,
        message: err.to_string(),
        data: serde_json::to_value(&err).ok(),
    }
}

//
// === Individual Handlers ===
//

/// Handle getAccount: the caller is whoever signed the read message.
fn handle_get_account(state: &RpcState, params: serde_json::Value) -> Result<serde_json::Value, RpcError> {
    let p: GetAccountParams = parse_params(params)?;
    let message = crypto::hash_read_message(&p.account, p.timestamp);
    let caller = crypto::recover_signer(&message, &p.caller_signature)
        .map_err(|e| ledger_error(LedgerError::MalformedSignature { reason: e.to_string() }))?;

    let keys = KeySet::new(p.item_ids, p.fragment_ids, p.season_ids);
    let snapshot = state
        .ledger
        .get_account(&caller, &p.account, &keys)
        .map_err(ledger_error)?;
    to_json(&AccountView::from(snapshot))
}

fn handle_create_account(state: &RpcState, params: serde_json::Value) -> Result<serde_json::Value, RpcError> {
    let p: CreateAccountParams = parse_params(params)?;
    let proof = LifecycleProof {
        salt: parse_salt(&p.salt)?,
        timestamp: p.timestamp,
        admin_signature: p.admin_signature,
    };
    let event = state.ledger.create_account(&p.account, &proof).map_err(ledger_error)?;
    to_json(&event)
}

fn handle_delete_account(state: &RpcState, params: serde_json::Value) -> Result<serde_json::Value, RpcError> {
    let p: DeleteAccountParams = parse_params(params)?;
    let proof = LifecycleProof {
        salt: parse_salt(&p.salt)?,
        timestamp: p.timestamp,
        admin_signature: p.admin_signature,
    };
    let keys = KeySet::new(p.item_ids, p.fragment_ids, p.season_ids);
    let event = state
        .ledger
        .delete_account(&p.account, &keys, &proof, &p.player_signature)
        .map_err(ledger_error)?;
    to_json(&event)
}

fn handle_account_exists(state: &RpcState, params: serde_json::Value) -> Result<serde_json::Value, RpcError> {
    let p: AccountExistsParams = parse_params(params)?;
    let exists = state.ledger.account_exists(&p.account).map_err(ledger_error)?;
    Ok(serde_json::json!({ "exists": exists }))
}

fn handle_hash_lifecycle_message(params: serde_json::Value) -> Result<serde_json::Value, RpcError> {
    let p: HashLifecycleParams = parse_params(params)?;
    let hash = AccountLedger::hash_lifecycle_message(&p.account, &parse_salt(&p.salt)?, p.timestamp);
    Ok(serde_json::json!({ "hash": bytes32_hex(&hash) }))
}

fn handle_hash_read_message(params: serde_json::Value) -> Result<serde_json::Value, RpcError> {
    let p: HashReadParams = parse_params(params)?;
    let hash = crypto::hash_read_message(&p.account, p.timestamp);
    Ok(serde_json::json!({ "hash": bytes32_hex(&hash) }))
}

fn handle_apply_write(state: &RpcState, params: serde_json::Value) -> Result<serde_json::Value, RpcError> {
    let p: ApplyWriteParams = parse_params(params)?;
    let proof = WriteProof { timestamp: p.timestamp, admin_signature: p.admin_signature };
    let outcome = state.ledger.apply_write(&p.account, &p.write, &proof).map_err(ledger_error)?;
    to_json(&WriteResultView::from(outcome))
}

fn handle_hash_write_message(params: serde_json::Value) -> Result<serde_json::Value, RpcError> {
    let p: HashWriteParams = parse_params(params)?;
    let hash = AccountLedger::hash_write_message(&p.account, &p.write, p.timestamp);
    Ok(serde_json::json!({ "hash": bytes32_hex(&hash) }))
}
