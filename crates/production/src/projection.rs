//! Sales-order status as a view of linked production.

use millerp_sales::SalesOrderStatus;

use crate::order::ProductionStatus;

/// Sales-order status implied by a production order entering `status`.
///
/// Entering production means the customer order is processing; completing it
/// means the customer order is completed. Other states imply nothing.
pub fn projected_sales_status(status: ProductionStatus) -> Option<SalesOrderStatus> {
    match status {
        ProductionStatus::InProduction => Some(SalesOrderStatus::Processing),
        ProductionStatus::Completed => Some(SalesOrderStatus::Completed),
        ProductionStatus::Pending | ProductionStatus::MaterialReady => None,
    }
}
