//! The node: composition root for one peer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use std::sync::RwLock as SyncRwLock;
use tokio::sync::{Mutex, RwLock};

use ember_ledger::{Block, ChainStore, LedgerError, Transaction};
use ember_mempool::{Mempool, MempoolError};
use ember_messages::{
    AckPayload, ChainRequest, ChainResponse, HandshakePayload, Message, MessageKind,
    PeerListPayload, StateSyncRequest, StateSyncResponse, SyncStatus,
};
use ember_network::{Broadcaster, Penalty, PeerTable, PendingMessages};
use ember_store::Snapshotter;
use ember_types::{Address, Amount, Clock, Digest};

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::miner;

/// Snapshot of a node's externally visible position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeStatus {
    pub node_id: String,
    pub height: u64,
    pub tip_hash: String,
    pub state_root: Digest,
}

/// One ember peer.
///
/// Lock order: chain > mempool > peers > pending. Outbound I/O never happens
/// under a lock — frames go through the broadcaster's queue.
pub struct Node {
    config: NodeConfig,
    params_digest: Digest,
    chain: RwLock<ChainStore>,
    mempool: Mutex<Mempool>,
    peers: SyncRwLock<PeerTable>,
    pending: Mutex<PendingMessages>,
    broadcaster: Broadcaster,
    clock: Arc<dyn Clock>,
    snapshotter: Option<Arc<dyn Snapshotter>>,
    msg_seq: AtomicU64,
}

impl Node {
    /// Create a node, replaying any persisted snapshot.
    ///
    /// A present-but-unloadable snapshot is fatal: silently mining on a
    /// fresh chain when the operator expected the stored one would fork the
    /// cluster.
    pub fn new(
        config: NodeConfig,
        clock: Arc<dyn Clock>,
        broadcaster: Broadcaster,
        snapshotter: Option<Arc<dyn Snapshotter>>,
    ) -> Result<Arc<Self>, NodeError> {
        let now_secs = clock.now_secs();

        let chain = match snapshotter.as_deref() {
            Some(store) if store.has_saved_data() => {
                let value = store
                    .load_blocks()?
                    .ok_or_else(|| NodeError::Other("snapshot has state but no blocks".into()))?;
                let blocks: Vec<Block> = serde_json::from_value(value)
                    .map_err(|e| NodeError::Other(format!("undecodable block snapshot: {e}")))?;
                let chain = ChainStore::from_blocks(config.params.clone(), blocks, now_secs)?;
                tracing::info!(height = chain.height(), "chain restored from snapshot");
                chain
            }
            _ => ChainStore::new(config.params.clone()),
        };

        let mut peers = PeerTable::new();
        for (peer_id, address) in &config.peers {
            peers.add(peer_id.clone(), address.clone(), now_secs);
        }

        let params_digest = ember_crypto::params_digest(&config.params);
        let mempool = Mempool::new(
            config.params.max_mempool_size,
            config.params.mempool_evict_batch,
        );
        let pending = PendingMessages::new(
            config.max_pending_messages,
            config.params.max_retries,
            config.params.retry_timeout_secs,
        );

        Ok(Arc::new(Self {
            config,
            params_digest,
            chain: RwLock::new(chain),
            mempool: Mutex::new(mempool),
            peers: SyncRwLock::new(peers),
            pending: Mutex::new(pending),
            broadcaster,
            clock,
            snapshotter,
            msg_seq: AtomicU64::new(0),
        }))
    }

    pub fn node_id(&self) -> &str {
        &self.config.node_id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    // ── Read-side accessors ────────────────────────────────────────────

    pub async fn status(&self) -> NodeStatus {
        let chain = self.chain.read().await;
        NodeStatus {
            node_id: self.config.node_id.clone(),
            height: chain.height(),
            tip_hash: chain.tip_hash(),
            state_root: chain.state_root(),
        }
    }

    pub async fn height(&self) -> u64 {
        self.chain.read().await.height()
    }

    pub async fn tip_hash(&self) -> String {
        self.chain.read().await.tip_hash()
    }

    pub async fn state_root(&self) -> Digest {
        self.chain.read().await.state_root()
    }

    pub async fn hash_at(&self, height: u64) -> Option<String> {
        self.chain.read().await.hash_at(height)
    }

    pub async fn suffix_from(&self, height: u64) -> Vec<Block> {
        self.chain.read().await.suffix_from(height)
    }

    pub async fn blocks(&self) -> Vec<Block> {
        self.chain.read().await.blocks().to_vec()
    }

    pub async fn balance(&self, address: &Address) -> Amount {
        self.chain.read().await.state().balance(address)
    }

    pub async fn account_table(&self) -> ember_ledger::AccountTable {
        self.chain.read().await.state().accounts().clone()
    }

    pub async fn mempool_len(&self) -> usize {
        self.mempool.lock().await.len()
    }

    /// Dial address for a peer id. Sync so the outbound transport task can
    /// resolve without entering async lock territory.
    pub fn resolve_peer(&self, peer_id: &str) -> Option<String> {
        let peers = self.peers.read().expect("peer table lock poisoned");
        peers.get(peer_id).map(|info| info.address.clone())
    }

    // ── Local operations ───────────────────────────────────────────────

    /// Seed an account balance directly in committed state (dev faucet).
    pub async fn create_account(&self, address: Address, balance: Amount) {
        let mut chain = self.chain.write().await;
        chain.state_mut().create_account(address, balance);
    }

    /// Admit a locally submitted transaction and gossip it.
    pub async fn submit_local(&self, tx: Transaction) -> Result<(), NodeError> {
        {
            let chain = self.chain.read().await;
            let mut mempool = self.mempool.lock().await;
            mempool.admit(tx.clone(), chain.state())?;
        }
        tracing::info!(id = %tx.id, from = %tx.from, amount = %tx.amount, "transaction admitted");
        let message = Message::new(MessageKind::NewTransaction, &self.config.node_id, &tx);
        self.broadcast_message(&message, None).await;
        Ok(())
    }

    /// Drain the mempool, mine one block, append, and gossip it.
    ///
    /// The proof search runs on a blocking thread against a chain snapshot;
    /// the append afterwards re-validates against the live tip, so a block
    /// raced out by gossip is rejected and its transactions re-admitted.
    pub async fn mine_once(&self) -> Result<Block, NodeError> {
        let (chain_snapshot, batch) = {
            let chain = self.chain.read().await;
            let mut mempool = self.mempool.lock().await;
            let batch = mempool.drain_valid(self.config.params.max_block_txs, chain.state());
            (chain.clone(), batch)
        };

        let now_secs = self.clock.now_secs();
        let batch_for_build = batch.clone();
        let block = tokio::task::spawn_blocking(move || {
            miner::build_block(&chain_snapshot, batch_for_build, now_secs)
        })
        .await
        .map_err(|e| NodeError::Other(format!("mining task panicked: {e}")))??;

        let append_result = {
            let mut chain = self.chain.write().await;
            chain.append(block.clone(), self.clock.now_secs())
        };

        match append_result {
            Ok(()) => {
                tracing::info!(
                    height = block.index,
                    txs = block.transactions.len(),
                    proof = block.proof,
                    hash = %block.hash_hex(),
                    "mined block"
                );
                self.persist().await;
                let message = Message::new(MessageKind::NewBlock, &self.config.node_id, &block);
                self.broadcast_message(&message, None).await;
                Ok(block)
            }
            Err(e) => {
                // The tip moved while we were mining; put the batch back.
                let chain = self.chain.read().await;
                let mut mempool = self.mempool.lock().await;
                for tx in batch {
                    let _ = mempool.admit(tx, chain.state());
                }
                Err(e.into())
            }
        }
    }

    // ── Inbound dispatch ───────────────────────────────────────────────

    /// Handle one inbound message. Called from the dispatcher task, one
    /// message at a time, so the state engine sees serialized mutations.
    pub async fn receive(&self, message: Message, remote_addr: &str) {
        let result = match message.kind {
            MessageKind::Handshake => self.handle_handshake(&message, remote_addr).await,
            MessageKind::NewTransaction => self.handle_new_transaction(&message).await,
            MessageKind::NewBlock => self.handle_new_block(&message).await,
            MessageKind::RequestChain => self.handle_request_chain(&message).await,
            MessageKind::ResponseChain => self.handle_response_chain(&message).await,
            MessageKind::SyncRequest => self.handle_sync_request(&message).await,
            MessageKind::SyncResponse => self.handle_sync_response(&message).await,
            MessageKind::PeerList => self.handle_peer_list(&message).await,
            MessageKind::Ack => self.handle_ack(&message).await,
            MessageKind::StateSyncRequest => self.handle_state_sync_request(&message).await,
            MessageKind::StateSyncResponse => self.handle_state_sync_response(&message).await,
        };
        if let Err(e) = result {
            tracing::warn!(kind = ?message.kind, sender = %message.sender_id, error = %e, "message handling failed");
        }
    }

    async fn handle_handshake(&self, message: &Message, remote_addr: &str) -> Result<(), NodeError> {
        let payload: HandshakePayload = message.decode_payload()?;
        if payload.params_digest != self.params_digest {
            tracing::warn!(
                peer = %payload.node_id,
                remote = remote_addr,
                "handshake rejected: chain parameter mismatch"
            );
            return Ok(());
        }

        {
            let mut peers = self.peers.write().expect("peer table lock poisoned");
            peers.add(&payload.node_id, &payload.listen_addr, self.clock.now_secs());
        }
        tracing::info!(peer = %payload.node_id, addr = %payload.listen_addr, "peer registered");

        // Share what we know so the newcomer fills its table.
        let peer_list = {
            let peers = self.peers.read().expect("peer table lock poisoned");
            PeerListPayload {
                peers: peers
                    .entries()
                    .map(|(id, addr)| (id.to_string(), addr.to_string()))
                    .collect(),
            }
        };
        let reply = Message::new(MessageKind::PeerList, &self.config.node_id, &peer_list);
        self.broadcaster.send(&payload.node_id, &reply);
        Ok(())
    }

    async fn handle_new_transaction(&self, message: &Message) -> Result<(), NodeError> {
        let tx: Transaction = message.decode_payload()?;
        let admitted = {
            let chain = self.chain.read().await;
            let mut mempool = self.mempool.lock().await;
            mempool.admit(tx.clone(), chain.state())
        };

        match admitted {
            Ok(()) => {
                tracing::debug!(id = %tx.id, sender = %message.sender_id, "transaction relayed");
                self.broadcast_message(message, Some(&message.sender_id)).await;
            }
            Err(MempoolError::Duplicate) => {
                // Gossip echo; the flood already reached us another way.
            }
            Err(MempoolError::Rejected(LedgerError::InvalidSignature))
            | Err(MempoolError::Rejected(LedgerError::MalformedTransaction(_))) => {
                let mut peers = self.peers.write().expect("peer table lock poisoned");
                peers.penalize(&message.sender_id, Penalty::InvalidTransaction);
            }
            Err(e) => {
                tracing::debug!(id = %tx.id, error = %e, "inbound transaction rejected");
            }
        }
        Ok(())
    }

    async fn handle_new_block(&self, message: &Message) -> Result<(), NodeError> {
        let block: Block = message.decode_payload()?;
        let now_secs = self.clock.now_secs();

        let local_height = self.height().await;

        if block.index <= local_height {
            // Re-broadcast of something we may already hold; adopting a
            // same-height competitor is the consensus monitor's call.
            let ours = self.hash_at(block.index).await;
            let theirs = block.hash_hex();
            if ours.as_deref() != Some(theirs.as_str()) {
                tracing::debug!(
                    height = block.index,
                    sender = %message.sender_id,
                    "competing block at known height, leaving to consensus"
                );
            }
            return Ok(());
        }

        if block.index > local_height + 1 {
            // We are behind; pull the gap from whoever told us.
            tracing::debug!(
                have = local_height,
                seen = block.index,
                peer = %message.sender_id,
                "behind the gossip, requesting chain suffix"
            );
            self.request_chain_suffix(&message.sender_id, local_height)
                .await;
            return Ok(());
        }

        let append_result = {
            let mut chain = self.chain.write().await;
            chain.append(block.clone(), now_secs)
        };

        match append_result {
            Ok(()) => {
                {
                    let mut mempool = self.mempool.lock().await;
                    mempool.remove_included(&block.transactions);
                }
                tracing::info!(
                    height = block.index,
                    hash = %block.hash_hex(),
                    sender = %message.sender_id,
                    "block accepted from gossip"
                );
                self.persist().await;
                self.broadcast_message(message, Some(&message.sender_id)).await;
            }
            Err(e) => {
                tracing::warn!(height = block.index, sender = %message.sender_id, error = %e, "inbound block rejected");
                let mut peers = self.peers.write().expect("peer table lock poisoned");
                peers.penalize(&message.sender_id, Penalty::InvalidBlock);
            }
        }
        Ok(())
    }

    async fn handle_request_chain(&self, message: &Message) -> Result<(), NodeError> {
        let request: ChainRequest = message.decode_payload()?;
        if !request.msg_id.is_empty() {
            let ack = Message::new(
                MessageKind::Ack,
                &self.config.node_id,
                &AckPayload {
                    msg_id: request.msg_id.clone(),
                },
            );
            self.broadcaster.send(&message.sender_id, &ack);
        }

        let blocks = self.suffix_from(request.from_height).await;
        tracing::debug!(
            peer = %message.sender_id,
            from_height = request.from_height,
            blocks = blocks.len(),
            "serving chain suffix"
        );
        let response = Message::new(
            MessageKind::ResponseChain,
            &self.config.node_id,
            &ChainResponse {
                blocks,
                msg_id: request.msg_id,
            },
        );
        self.broadcaster.send(&message.sender_id, &response);
        Ok(())
    }

    async fn handle_response_chain(&self, message: &Message) -> Result<(), NodeError> {
        let response: ChainResponse = message.decode_payload()?;
        if !response.msg_id.is_empty() {
            let mut pending = self.pending.lock().await;
            pending.ack(&response.msg_id);
        }

        let Some(first) = response.blocks.first() else {
            return Ok(());
        };
        let Some(last) = response.blocks.last() else {
            return Ok(());
        };

        let local_height = self.height().await;
        if last.index <= local_height {
            // Not longer than what we already hold; strict longest-chain
            // keeps us put (equal-height ties resolve via the monitor).
            return Ok(());
        }

        let from_height = first.index - 1;
        let adopt_result = {
            let mut chain = self.chain.write().await;
            chain.replace_suffix(from_height, response.blocks.clone(), self.clock.now_secs())
        };

        match adopt_result {
            Ok(()) => {
                let mut mempool = self.mempool.lock().await;
                for block in &response.blocks {
                    mempool.remove_included(&block.transactions);
                }
                drop(mempool);
                tracing::info!(
                    from = %message.sender_id,
                    new_height = last.index,
                    "adopted longer chain suffix"
                );
                self.persist().await;
            }
            Err(e) => {
                tracing::warn!(from = %message.sender_id, error = %e, "could not adopt chain suffix");
            }
        }
        Ok(())
    }

    async fn handle_sync_request(&self, message: &Message) -> Result<(), NodeError> {
        let status = self.status().await;
        let reply = Message::new(
            MessageKind::SyncResponse,
            &self.config.node_id,
            &SyncStatus {
                node_id: status.node_id,
                height: status.height,
                tip_hash: status.tip_hash,
            },
        );
        self.broadcaster.send(&message.sender_id, &reply);
        Ok(())
    }

    async fn handle_sync_response(&self, message: &Message) -> Result<(), NodeError> {
        let status: SyncStatus = message.decode_payload()?;
        let local_height = self.height().await;
        if status.height > local_height {
            tracing::debug!(peer = %status.node_id, theirs = status.height, ours = local_height, "peer is ahead");
            self.request_chain_suffix(&message.sender_id, local_height)
                .await;
        }
        Ok(())
    }

    async fn handle_peer_list(&self, message: &Message) -> Result<(), NodeError> {
        let payload: PeerListPayload = message.decode_payload()?;
        let now_secs = self.clock.now_secs();
        let mut peers = self.peers.write().expect("peer table lock poisoned");
        for (peer_id, address) in payload.peers {
            if peer_id != self.config.node_id {
                peers.add(peer_id, address, now_secs);
            }
        }
        Ok(())
    }

    async fn handle_ack(&self, message: &Message) -> Result<(), NodeError> {
        let ack: AckPayload = message.decode_payload()?;
        let mut pending = self.pending.lock().await;
        pending.ack(&ack.msg_id);
        Ok(())
    }

    async fn handle_state_sync_request(&self, message: &Message) -> Result<(), NodeError> {
        let _request: StateSyncRequest = message.decode_payload()?;
        let (state_root, block_height, accounts) = {
            let chain = self.chain.read().await;
            (
                chain.state_root(),
                chain.height(),
                chain.state().accounts().clone(),
            )
        };
        tracing::debug!(
            peer = %message.sender_id,
            accounts = accounts.len(),
            root = %state_root,
            "serving state snapshot"
        );
        let reply = Message::new(
            MessageKind::StateSyncResponse,
            &self.config.node_id,
            &StateSyncResponse {
                state_root,
                block_height,
                node_id: self.config.node_id.clone(),
                accounts,
            },
        );
        self.broadcaster.send(&message.sender_id, &reply);
        Ok(())
    }

    async fn handle_state_sync_response(&self, message: &Message) -> Result<(), NodeError> {
        let response: StateSyncResponse = message.decode_payload()?;
        {
            let mut pending = self.pending.lock().await;
            pending.ack(&state_sync_msg_id(&message.sender_id));
        }

        let status = self.status().await;
        if response.block_height != status.height {
            tracing::debug!(
                peer = %response.node_id,
                theirs = response.block_height,
                ours = status.height,
                "state roots not comparable at different heights"
            );
            return Ok(());
        }
        if response.state_root == status.state_root {
            tracing::info!(peer = %response.node_id, root = %status.state_root, "state in sync");
        } else {
            // Equal chains must imply equal roots; this is surfaced, never
            // papered over. Repair is the consensus monitor's decision.
            tracing::warn!(
                peer = %response.node_id,
                ours = %status.state_root,
                theirs = %response.state_root,
                "state divergence detected"
            );
        }
        Ok(())
    }

    // ── Outbound requests ──────────────────────────────────────────────

    /// Send our handshake to every configured peer.
    pub async fn announce(&self) {
        let payload = HandshakePayload {
            node_id: self.config.node_id.clone(),
            listen_addr: self.config.listen_addr.clone(),
            params_digest: self.params_digest,
        };
        let message = Message::new(MessageKind::Handshake, &self.config.node_id, &payload);
        self.broadcast_message(&message, None).await;
    }

    /// Ask a peer for every block strictly above `from_height`. Tracked for
    /// retry until the response (or an `ACK`) arrives.
    pub async fn request_chain_suffix(&self, peer_id: &str, from_height: u64) {
        let msg_id = self.next_msg_id();
        let message = Message::new(
            MessageKind::RequestChain,
            &self.config.node_id,
            &ChainRequest {
                from_height,
                msg_id: msg_id.clone(),
            },
        );
        {
            let mut pending = self.pending.lock().await;
            pending.track(
                msg_id,
                message.clone(),
                peer_id.to_string(),
                self.clock.now_secs(),
            );
        }
        self.broadcaster.send(peer_id, &message);
    }

    /// Ask a peer for its full account table, for state cross-checking.
    pub async fn request_state_snapshot(&self, peer_id: &str) {
        let message = Message::new(
            MessageKind::StateSyncRequest,
            &self.config.node_id,
            &StateSyncRequest {
                node_id: self.config.node_id.clone(),
            },
        );
        {
            let mut pending = self.pending.lock().await;
            pending.track(
                state_sync_msg_id(peer_id),
                message.clone(),
                peer_id.to_string(),
                self.clock.now_secs(),
            );
        }
        self.broadcaster.send(peer_id, &message);
    }

    /// One pass of the retry timer: re-send overdue tracked messages and
    /// penalize peers whose budget ran out.
    pub async fn retry_tick(&self) {
        let (due, exhausted) = {
            let mut pending = self.pending.lock().await;
            pending.due(self.clock.now_secs())
        };
        for item in due {
            tracing::debug!(msg_id = %item.msg_id, peer = %item.target_peer, attempt = item.attempt, "retrying message");
            self.broadcaster.send(&item.target_peer, &item.message);
        }
        if !exhausted.is_empty() {
            let mut peers = self.peers.write().expect("peer table lock poisoned");
            for peer_id in exhausted {
                peers.penalize(&peer_id, Penalty::Timeout);
            }
        }
    }

    // ── Consensus-monitor hooks ────────────────────────────────────────

    /// Atomically replace everything above `from_height` with `suffix`.
    pub async fn replace_suffix(
        &self,
        from_height: u64,
        suffix: Vec<Block>,
    ) -> Result<(), LedgerError> {
        let result = {
            let mut chain = self.chain.write().await;
            chain.replace_suffix(from_height, suffix, self.clock.now_secs())
        };
        if result.is_ok() {
            self.persist().await;
        }
        result
    }

    /// Overwrite committed state with a snapshot pulled from a peer whose
    /// chain already matches ours (hard state repair).
    pub async fn replace_state(&self, accounts: ember_ledger::AccountTable) {
        let mut chain = self.chain.write().await;
        chain.replace_state(ember_ledger::State::with_accounts(accounts));
    }

    // ── Internals ──────────────────────────────────────────────────────

    async fn broadcast_message(&self, message: &Message, except: Option<&str>) {
        let peer_ids: Vec<String> = {
            let peers = self.peers.read().expect("peer table lock poisoned");
            peers.ids().map(str::to_string).collect()
        };
        self.broadcaster
            .broadcast_except(message, peer_ids.iter().map(String::as_str), except);
    }

    fn next_msg_id(&self) -> String {
        let seq = self.msg_seq.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.config.node_id, seq)
    }

    /// Push the chain and state snapshot to the persister, if configured.
    /// Runtime faults are logged and survived; the in-memory chain is the
    /// authority.
    pub async fn persist(&self) {
        let Some(store) = self.snapshotter.as_deref() else {
            return;
        };
        let (blocks_value, state_value) = {
            let chain = self.chain.read().await;
            let blocks = serde_json::to_value(chain.blocks())
                .expect("block serialization is infallible");
            let accounts = chain.state().accounts();
            let balances: serde_json::Map<String, serde_json::Value> = accounts
                .iter()
                .map(|(addr, acct)| (addr.to_string(), acct.balance.raw().into()))
                .collect();
            let nonces: serde_json::Map<String, serde_json::Value> = accounts
                .iter()
                .map(|(addr, acct)| {
                    (
                        addr.to_string(),
                        acct.nonce.map_or(serde_json::Value::Null, Into::into),
                    )
                })
                .collect();
            let state = serde_json::json!({
                "balances": balances,
                "nonces": nonces,
                "difficulty": chain.params().difficulty_at(chain.height()),
            });
            (blocks, state)
        };
        if let Err(e) = store.save_blocks(&blocks_value) {
            tracing::warn!(error = %e, "block snapshot save failed");
        }
        if let Err(e) = store.save_state(&state_value) {
            tracing::warn!(error = %e, "state snapshot save failed");
        }
    }
}

/// Correlation id for a state-sync request to `peer_id` (the payload itself
/// carries no id, so the pair (kind, peer) is the key).
fn state_sync_msg_id(peer_id: &str) -> String {
    format!("state-sync:{peer_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_messages::decode_frame;
    use ember_nullables::NullClock;
    use ember_types::ChainParams;
    use tokio::sync::mpsc;

    const START: u64 = 1_704_100_000;

    fn test_node() -> (Arc<Node>, mpsc::Receiver<(String, Vec<u8>)>) {
        let config = NodeConfig {
            node_id: "node-1".into(),
            ..NodeConfig::default()
        };
        let (tx, rx) = mpsc::channel(64);
        let node = Node::new(
            config,
            Arc::new(NullClock::new(START)) as Arc<dyn Clock>,
            Broadcaster::new(tx),
            None,
        )
        .unwrap();
        (node, rx)
    }

    fn handshake_from(node_id: &str, params: &ChainParams) -> Message {
        Message::new(
            MessageKind::Handshake,
            node_id,
            &HandshakePayload {
                node_id: node_id.to_string(),
                listen_addr: format!("test://{node_id}"),
                params_digest: ember_crypto::params_digest(params),
            },
        )
    }

    #[tokio::test]
    async fn handshake_registers_peer_and_shares_peer_list() {
        let (node, mut rx) = test_node();
        node.receive(handshake_from("node-2", &ChainParams::default()), "remote")
            .await;

        assert_eq!(node.resolve_peer("node-2").as_deref(), Some("test://node-2"));
        let (target, frame) = rx.recv().await.unwrap();
        assert_eq!(target, "node-2");
        let reply = decode_frame(&frame).unwrap();
        assert_eq!(reply.kind, MessageKind::PeerList);
    }

    #[tokio::test]
    async fn handshake_with_foreign_params_is_rejected() {
        let (node, mut rx) = test_node();
        let mut foreign = ChainParams::default();
        foreign.max_block_txs += 1;
        node.receive(handshake_from("node-x", &foreign), "remote")
            .await;

        assert_eq!(node.resolve_peer("node-x"), None);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn chain_request_is_tracked_until_acked() {
        let (node, mut rx) = test_node();
        node.receive(handshake_from("node-2", &ChainParams::default()), "remote")
            .await;
        let _ = rx.recv().await; // peer list reply

        node.request_chain_suffix("node-2", 1).await;
        let (_, frame) = rx.recv().await.unwrap();
        let request = decode_frame(&frame).unwrap();
        assert_eq!(request.kind, MessageKind::RequestChain);
        let payload: ChainRequest = request.decode_payload().unwrap();
        assert!(!payload.msg_id.is_empty());

        // An ACK clears the entry; the retry timer then has nothing to do.
        let ack = Message::new(
            MessageKind::Ack,
            "node-2",
            &AckPayload {
                msg_id: payload.msg_id,
            },
        );
        node.receive(ack, "remote").await;
        node.retry_tick().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unacked_request_is_resent_after_timeout() {
        let config = NodeConfig {
            node_id: "node-1".into(),
            ..NodeConfig::default()
        };
        let (tx, mut rx) = mpsc::channel(64);
        let clock = Arc::new(NullClock::new(START));
        let node = Node::new(
            config,
            clock.clone() as Arc<dyn Clock>,
            Broadcaster::new(tx),
            None,
        )
        .unwrap();

        node.receive(handshake_from("node-2", &ChainParams::default()), "remote")
            .await;
        let _ = rx.recv().await; // peer list reply

        node.request_chain_suffix("node-2", 1).await;
        let _ = rx.recv().await; // the original send

        // Before the timeout nothing is re-sent.
        node.retry_tick().await;
        assert!(rx.try_recv().is_err());

        clock.advance(node.config().params.retry_timeout_secs + 1);
        node.retry_tick().await;
        let (target, frame) = rx.recv().await.unwrap();
        assert_eq!(target, "node-2");
        assert_eq!(decode_frame(&frame).unwrap().kind, MessageKind::RequestChain);
    }

    #[tokio::test]
    async fn state_sync_request_gets_full_table() {
        let (node, mut rx) = test_node();
        node.create_account(Address::new("0xa"), Amount::new(750))
            .await;
        node.receive(handshake_from("node-2", &ChainParams::default()), "remote")
            .await;
        let _ = rx.recv().await;

        let request = Message::new(
            MessageKind::StateSyncRequest,
            "node-2",
            &StateSyncRequest {
                node_id: "node-2".into(),
            },
        );
        node.receive(request, "remote").await;

        let (target, frame) = rx.recv().await.unwrap();
        assert_eq!(target, "node-2");
        let reply = decode_frame(&frame).unwrap();
        assert_eq!(reply.kind, MessageKind::StateSyncResponse);
        let payload: StateSyncResponse = reply.decode_payload().unwrap();
        assert_eq!(payload.node_id, "node-1");
        assert_eq!(
            payload.accounts[&Address::new("0xa")].balance,
            Amount::new(750)
        );
        assert_eq!(payload.state_root, node.state_root().await);
    }
}
