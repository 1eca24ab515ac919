//! HTTP server layer for the CMS backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │      POST /upload-image    /{collection}[/{id}]    /submit      │
//! │                                                                 │
//! │  ┌────────────┐  ┌──────────────┐  ┌───────────┐  ┌──────────┐  │
//! │  │  handlers  │  │     auth     │  │ ratelimit │  │  routes  │  │
//! │  │ (requests) │  │(bearer token)│  │ (contact) │  │ (router) │  │
//! │  └────────────┘  └──────────────┘  └───────────┘  └──────────┘  │
//! │  ┌────────────┐                                                 │
//! │  │  accounts  │  stored admins, bcrypt                          │
//! │  └────────────┘                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod accounts;
pub mod auth;
pub mod handlers;
pub mod ratelimit;
pub mod routes;

pub use accounts::{
    admin_add_handler, admin_update_handler, AdminCreated, AdminUpdate, NewAdmin, PasswordHasher,
};
pub use auth::{
    collection_guard, require_admin, requires_admin, AdminCredentials, AuthError, Claims,
    IssuedToken, LoginRequest, TokenAuth,
};
pub use handlers::{
    application_status_handler, create_handler, delete_handler, get_handler, health_handler,
    list_handler, login_handler, reply_handler, solve_handler, submit_handler, update_handler,
    upload_handler, AppState, ContactForm, ErrorResponse, HandlerError, HealthResponse,
    MessageResponse, ReplyRequest, StatusResponse, SubmitResponse,
};
pub use ratelimit::{ClientId, ForwardedPolicy, RateLimited, RateLimiter};
pub use routes::{create_dev_router, create_router, RouterConfig};
