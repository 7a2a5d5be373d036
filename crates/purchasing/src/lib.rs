//! Purchasing domain module (material purchase orders).
//!
//! Business rules for purchase orders, implemented purely as deterministic
//! domain logic. Receiving and reversing stock is orchestrated by the
//! infrastructure layer through the inventory ledger.

pub mod events;
pub mod order;

pub use events::{
    PurchaseDeleted, PurchaseEvent, PurchaseReceived, PurchaseStatusChanged, ReceiptCancelled,
    ReceivedLine,
};
pub use order::{
    NewPurchaseOrder, PurchaseAction, PurchaseLine, PurchaseOrder, PurchaseOrderId, PurchaseStatus,
};
