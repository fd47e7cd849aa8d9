//! Typed views of the tenant-scoped tables the server touches.

pub mod finance;
pub mod order;
pub mod product;
pub mod salary;
pub mod social;

pub use finance::{Debt, DebtStatus, DebtType, EntryType, FinanceEntry, FinanceError};
pub use order::{Order, OrderItem, OrderStatus};
pub use product::{ComboComponent, Product};
pub use salary::{CustomItem, Salary, SalaryStatus};
pub use social::{Platform, SocialConnection};
