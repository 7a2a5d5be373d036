//! Sales domain module.
//!
//! Sales orders (whose status is a projection of linked production) and
//! product outbound shipments with their daily numbering.

pub mod events;
pub mod numbering;
pub mod order;
pub mod outbound;

pub use events::{OutboundLineChanged, OutboundStatusChanged, SalesEvent, SalesOrderProjected};
pub use numbering::next_outbound_number;
pub use order::{NewSalesOrder, SalesOrder, SalesOrderId, SalesOrderStatus};
pub use outbound::{OutboundId, OutboundLine, OutboundLineInput, OutboundStatus, ProductOutbound};
