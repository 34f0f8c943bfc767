use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::warn;
use uuid::Uuid;

use crate::clock::now_unix;
use crate::db::tenant::TenantId;
use crate::db::{address, business, internals, tokens, withdraws, Store};
use crate::error::WalletError;
use crate::fee::parse_fast_fee;
use crate::rpc::{ChainRpcClient, UnsignedTxRequest};
use crate::types::{AddressType, TxType};

use super::proto::wallet_business_services_server::WalletBusinessServices;
use super::proto::*;

pub struct WalletService {
    store: Store,
    rpc: Arc<dyn ChainRpcClient>,
}

impl WalletService {
    pub fn new(store: Store, rpc: Arc<dyn ChainRpcClient>) -> Self {
        Self { store, rpc }
    }

    fn tenant(&self, request_id: &str) -> Result<TenantId, Status> {
        TenantId::parse(request_id).map_err(|_| Status::invalid_argument("invalid request_id"))
    }
}

fn log_internal_error(context: &str, err: WalletError) -> String {
    warn!(context, error = %err, "request handler failed");
    "internal error".to_string()
}

#[tonic::async_trait]
impl WalletBusinessServices for WalletService {
    async fn business_register(
        &self,
        request: Request<BusinessRegisterRequest>,
    ) -> Result<Response<BusinessRegisterResponse>, Status> {
        let req = request.into_inner();
        let tenant = self.tenant(&req.request_id)?;

        if let Err(e) = business::store_business(&self.store.pool, &req.request_id, &req.notify_url, now_unix()).await {
            return Ok(Response::new(BusinessRegisterResponse {
                code: ReturnCode::Error as i32,
                msg: log_internal_error("business_register", e),
            }));
        }
        if let Err(e) = self.store.create_tenant_tables(&tenant).await {
            return Ok(Response::new(BusinessRegisterResponse {
                code: ReturnCode::Error as i32,
                msg: log_internal_error("business_register.create_tenant_tables", e),
            }));
        }

        Ok(Response::new(BusinessRegisterResponse { code: ReturnCode::Success as i32, msg: "ok".into() }))
    }

    async fn export_address_by_public_keys(
        &self,
        request: Request<ExportAddressRequest>,
    ) -> Result<Response<ExportAddressResponse>, Status> {
        let req = request.into_inner();
        let tenant = self.tenant(&req.request_id)?;
        let timestamp = now_unix();

        let mut exported = Vec::with_capacity(req.public_keys.len());
        let mut tx = match self.store.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                return Ok(Response::new(ExportAddressResponse {
                    code: ReturnCode::Error as i32,
                    msg: log_internal_error("export_address.begin", e.into()),
                    addresses: vec![],
                }))
            }
        };

        for key in &req.public_keys {
            let address_type: AddressType = match key.r#type.parse() {
                Ok(t) => t,
                Err(_) => AddressType::User,
            };
            let derived = match self.rpc.convert_address(&key.public_key, &key.r#type).await {
                Ok(a) => a,
                Err(e) => {
                    return Ok(Response::new(ExportAddressResponse {
                        code: ReturnCode::Error as i32,
                        msg: log_internal_error("export_address.convert_address", e),
                        addresses: vec![],
                    }))
                }
            };

            let new_address = address::NewAddress {
                address: derived.as_str().to_string(),
                address_type,
                public_key: key.public_key.clone(),
                timestamp,
            };
            if let Err(e) = address::store_address_with_zero_balance(&mut tx, &tenant, &new_address).await {
                return Ok(Response::new(ExportAddressResponse {
                    code: ReturnCode::Error as i32,
                    msg: log_internal_error("export_address.store", e),
                    addresses: vec![],
                }));
            }

            exported.push(ExportedAddress {
                r#type: key.r#type.clone(),
                address: derived.as_str().to_string(),
                public_key: key.public_key.clone(),
            });
        }

        if let Err(e) = tx.commit().await {
            return Ok(Response::new(ExportAddressResponse {
                code: ReturnCode::Error as i32,
                msg: log_internal_error("export_address.commit", e.into()),
                addresses: vec![],
            }));
        }

        Ok(Response::new(ExportAddressResponse { code: ReturnCode::Success as i32, msg: "ok".into(), addresses: exported }))
    }

    async fn set_token_address(
        &self,
        request: Request<SetTokenAddressRequest>,
    ) -> Result<Response<SetTokenAddressResponse>, Status> {
        let req = request.into_inner();
        let tenant = self.tenant(&req.request_id)?;
        let timestamp = now_unix();

        let new_tokens: Vec<tokens::NewToken> = req
            .tokens
            .into_iter()
            .map(|t| tokens::NewToken {
                token_address: t.address,
                decimals: t.decimals as i16,
                token_name: t.name,
                collect_amount: t.collect_amount,
                cold_amount: t.cold_amount,
                timestamp,
            })
            .collect();

        let mut tx = match self.store.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                return Ok(Response::new(SetTokenAddressResponse {
                    code: ReturnCode::Error as i32,
                    msg: log_internal_error("set_token_address.begin", e.into()),
                }))
            }
        };
        if let Err(e) = tokens::store_tokens(&mut tx, &tenant, &new_tokens).await {
            return Ok(Response::new(SetTokenAddressResponse {
                code: ReturnCode::Error as i32,
                msg: log_internal_error("set_token_address.store", e),
            }));
        }
        if let Err(e) = tx.commit().await {
            return Ok(Response::new(SetTokenAddressResponse {
                code: ReturnCode::Error as i32,
                msg: log_internal_error("set_token_address.commit", e.into()),
            }));
        }

        Ok(Response::new(SetTokenAddressResponse { code: ReturnCode::Success as i32, msg: "ok".into() }))
    }

    async fn build_un_sign_transaction(
        &self,
        request: Request<UnSignTransactionRequest>,
    ) -> Result<Response<UnSignTransactionResponse>, Status> {
        let req = request.into_inner();
        let tenant = self.tenant(&req.request_id)?;
        let timestamp = now_unix();

        let from = crate::types::Address::from_hex(&req.from);
        let to = crate::types::Address::from_hex(&req.to);
        let value: num_bigint::BigUint = match req.value.parse() {
            Ok(v) => v,
            Err(_) => {
                return Ok(Response::new(UnSignTransactionResponse {
                    code: ReturnCode::Error as i32,
                    msg: "malformed value".into(),
                    transaction_id: String::new(),
                    unsigned_tx: String::new(),
                }))
            }
        };
        let contract_address = if req.contract_address.is_empty() {
            None
        } else {
            Some(crate::types::Address::from_hex(&req.contract_address))
        };

        let unsigned = match self
            .rpc
            .build_unsigned(&UnsignedTxRequest {
                chain_id: req.chain_id.clone(),
                from: from.clone(),
                to: to.clone(),
                value: value.clone(),
                contract_address: contract_address.clone(),
                token_id: Some(req.token_id.clone()),
            })
            .await
        {
            Ok(u) => u,
            Err(e) => {
                return Ok(Response::new(UnSignTransactionResponse {
                    code: ReturnCode::Error as i32,
                    msg: log_internal_error("build_unsigned.rpc", e),
                    transaction_id: String::new(),
                    unsigned_tx: String::new(),
                }))
            }
        };

        let token_address_str = contract_address.as_ref().map(|a| a.as_str().to_string()).unwrap_or_default();

        let guid = match req.tx_type.as_str() {
            "withdraw" => {
                let draft = withdraws::NewDraft {
                    from_address: from.as_str().to_string(),
                    to_address: to.as_str().to_string(),
                    value: value.to_string(),
                    token_address: token_address_str,
                    token_id: req.token_id.clone(),
                    token_meta: req.token_meta.clone(),
                    unsigned_tx: unsigned.clone(),
                    timestamp,
                };
                withdraws::insert_draft(&self.store.pool, &tenant, &draft).await
            }
            "collection" | "internal" | "hot_to_cold" | "cold_to_hot" => {
                let tx_type = match req.tx_type.as_str() {
                    "collection" => TxType::Collection,
                    "cold_to_hot" => TxType::ColdToHot,
                    _ => TxType::HotToCold,
                };
                let draft = internals::NewDraft {
                    from_address: from.as_str().to_string(),
                    to_address: to.as_str().to_string(),
                    value: value.to_string(),
                    token_address: token_address_str,
                    token_id: req.token_id.clone(),
                    token_meta: req.token_meta.clone(),
                    unsigned_tx: unsigned.clone(),
                    timestamp,
                    tx_type,
                };
                internals::insert_draft(&self.store.pool, &tenant, &draft).await
            }
            other => {
                return Ok(Response::new(UnSignTransactionResponse {
                    code: ReturnCode::Error as i32,
                    msg: format!("unknown tx_type {other}"),
                    transaction_id: String::new(),
                    unsigned_tx: String::new(),
                }))
            }
        };

        match guid {
            Ok(guid) => Ok(Response::new(UnSignTransactionResponse {
                code: ReturnCode::Success as i32,
                msg: "ok".into(),
                transaction_id: guid.to_string(),
                unsigned_tx: unsigned,
            })),
            Err(e) => Ok(Response::new(UnSignTransactionResponse {
                code: ReturnCode::Error as i32,
                msg: log_internal_error("build_unsigned.store", e),
                transaction_id: String::new(),
                unsigned_tx: String::new(),
            })),
        }
    }

    async fn build_signed_transaction(
        &self,
        request: Request<SignedTransactionRequest>,
    ) -> Result<Response<SignedTransactionResponse>, Status> {
        let req = request.into_inner();
        let tenant = self.tenant(&req.request_id)?;
        let guid = match Uuid::parse_str(&req.transaction_id) {
            Ok(g) => g,
            Err(_) => {
                return Ok(Response::new(SignedTransactionResponse {
                    code: ReturnCode::Error as i32,
                    msg: "malformed transaction_id".into(),
                    signed_tx: String::new(),
                }))
            }
        };

        let is_internal = matches!(req.tx_type.as_str(), "collection" | "internal" | "hot_to_cold" | "cold_to_hot");
        let draft = if is_internal {
            internals::fetch_draft(&self.store.pool, &tenant, guid).await
        } else {
            withdraws::fetch_draft(&self.store.pool, &tenant, guid).await
        };
        let draft = match draft {
            Ok(Some(d)) => d,
            Ok(None) => {
                return Ok(Response::new(SignedTransactionResponse {
                    code: ReturnCode::Error as i32,
                    msg: "unknown transaction_id".into(),
                    signed_tx: String::new(),
                }))
            }
            Err(e) => {
                return Ok(Response::new(SignedTransactionResponse {
                    code: ReturnCode::Error as i32,
                    msg: log_internal_error("build_signed.fetch_draft", e),
                    signed_tx: String::new(),
                }))
            }
        };

        let fast_fee = match self.rpc.get_fee().await {
            Ok(f) => f,
            Err(e) => {
                return Ok(Response::new(SignedTransactionResponse {
                    code: ReturnCode::Error as i32,
                    msg: log_internal_error("build_signed.get_fee", e),
                    signed_tx: String::new(),
                }))
            }
        };
        let fee = match parse_fast_fee(&fast_fee) {
            Ok(f) => f,
            Err(e) => {
                return Ok(Response::new(SignedTransactionResponse {
                    code: ReturnCode::Error as i32,
                    msg: log_internal_error("build_signed.parse_fee", e),
                    signed_tx: String::new(),
                }))
            }
        };

        let signed = match self.rpc.build_signed(&draft.unsigned_tx, &req.signature).await {
            Ok(s) => s,
            Err(e) => {
                return Ok(Response::new(SignedTransactionResponse {
                    code: ReturnCode::Error as i32,
                    msg: log_internal_error("build_signed.rpc", e),
                    signed_tx: String::new(),
                }))
            }
        };

        let mark_result = if is_internal {
            internals::mark_signed(
                &self.store.pool,
                &tenant,
                guid,
                &signed,
                &fee.max_fee_per_gas.to_string(),
                &fee.max_priority_fee_per_gas.to_string(),
            )
            .await
        } else {
            withdraws::mark_signed(
                &self.store.pool,
                &tenant,
                guid,
                &signed,
                &fee.max_fee_per_gas.to_string(),
                &fee.max_priority_fee_per_gas.to_string(),
            )
            .await
        };

        if let Err(e) = mark_result {
            return Ok(Response::new(SignedTransactionResponse {
                code: ReturnCode::Error as i32,
                msg: log_internal_error("build_signed.mark_signed", e),
                signed_tx: String::new(),
            }));
        }

        Ok(Response::new(SignedTransactionResponse { code: ReturnCode::Success as i32, msg: "ok".into(), signed_tx: signed }))
    }
}
