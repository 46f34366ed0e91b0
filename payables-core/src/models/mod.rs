pub mod bill;
pub mod branch;
pub mod category;
pub mod payment_method;
pub mod supplier;

pub use bill::{Bill, BillFilter, BillStatus, BillView, CreateBill, UpdateBill};
pub use branch::{Branch, CreateBranch};
pub use category::{Category, CategoryKind, CreateCategory};
pub use payment_method::{CreatePaymentMethod, PaymentMethod};
pub use supplier::{CreateSupplier, PersonKind, Supplier};
