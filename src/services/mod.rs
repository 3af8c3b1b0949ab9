//! Business logic services.
//!
//! Services contain the payment logic separated from HTTP handlers. They
//! reach the gateway, the ledger and the catalog only through `AppState`.

pub mod amount_validator;
pub mod catalog;
pub mod ledger;
pub mod payment_link_service;
pub mod purchase_service;
pub mod refund_service;
pub mod status_mapper;
pub mod transaction_service;
pub mod webhook_service;
