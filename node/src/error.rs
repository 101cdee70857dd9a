use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] ember_ledger::LedgerError),

    #[error("mempool error: {0}")]
    Mempool(#[from] ember_mempool::MempoolError),

    #[error("network error: {0}")]
    Network(#[from] ember_network::NetworkError),

    #[error("message error: {0}")]
    Message(#[from] ember_messages::MessageError),

    #[error("persister fault: {0}")]
    Persister(#[from] ember_store::StoreError),

    #[error("work error: {0}")]
    Work(#[from] ember_work::WorkError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
