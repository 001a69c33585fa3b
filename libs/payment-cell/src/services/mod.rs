pub mod channel;
pub mod checkout;
pub mod refund;

pub use channel::{LoopbackPaymentChannel, PaymentChannel, RedisPaymentChannel};
pub use checkout::{CheckoutService, CompletionHook, PaymentCheckout};
pub use refund::RefundService;
