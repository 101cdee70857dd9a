//! Request handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use ember_ledger::Transaction;
use ember_node::Node;
use ember_types::{Address, Amount};

use crate::RpcError;

pub async fn get_chain(State(node): State<Arc<Node>>) -> Json<Value> {
    let blocks = node.blocks().await;
    Json(json!({ "length": blocks.len(), "blocks": blocks }))
}

pub async fn get_height(State(node): State<Arc<Node>>) -> Json<Value> {
    let status = node.status().await;
    Json(json!({
        "node_id": status.node_id,
        "height": status.height,
        "tip_hash": status.tip_hash,
    }))
}

pub async fn get_state_root(State(node): State<Arc<Node>>) -> Json<Value> {
    let status = node.status().await;
    Json(json!({
        "state_root": status.state_root,
        "height": status.height,
    }))
}

pub async fn get_balance(
    State(node): State<Arc<Node>>,
    Path(address): Path<String>,
) -> Json<Value> {
    let address = Address::new(address);
    let table = node.account_table().await;
    let account = table.get(&address);
    Json(json!({
        "address": address,
        "balance": account.map_or(0, |a| a.balance.raw()),
        "nonce": account.and_then(|a| a.nonce),
    }))
}

pub async fn get_mempool(State(node): State<Arc<Node>>) -> Json<Value> {
    Json(json!({ "pending": node.mempool_len().await }))
}

pub async fn submit_transaction(
    State(node): State<Arc<Node>>,
    Json(tx): Json<Transaction>,
) -> Result<Json<Value>, RpcError> {
    let id = tx.id;
    node.submit_local(tx)
        .await
        .map_err(|e| RpcError::Rejected(e.to_string()))?;
    Ok(Json(json!({ "accepted": true, "id": id })))
}

pub async fn mine(State(node): State<Arc<Node>>) -> Result<Json<Value>, RpcError> {
    let block = node
        .mine_once()
        .await
        .map_err(|e| RpcError::Rejected(e.to_string()))?;
    Ok(Json(json!({
        "height": block.index,
        "hash": block.hash_hex(),
        "transactions": block.transactions.len(),
        "proof": block.proof,
    })))
}

#[derive(Deserialize)]
pub struct FaucetRequest {
    pub address: String,
    pub amount: u64,
}

pub async fn faucet(
    State(node): State<Arc<Node>>,
    Json(request): Json<FaucetRequest>,
) -> Result<Json<Value>, RpcError> {
    if request.address.is_empty() {
        return Err(RpcError::Rejected("address must not be empty".into()));
    }
    let address = Address::new(request.address);
    node.create_account(address.clone(), Amount::new(request.amount))
        .await;
    let balance = node.balance(&address).await;
    Ok(Json(json!({ "address": address, "balance": balance.raw() })))
}
