pub mod service;

pub mod proto {
    tonic::include_proto!("wallet.v1");
}

pub use service::WalletService;
