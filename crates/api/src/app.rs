use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use domain::services::{CouponAllocator, CouponInventory};
use domain::store::Stores;
use shared::jwt::{JwtConfig, JwtError};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    ensure_session, metrics_handler, metrics_middleware, rate_limit_middleware, require_admin,
    security_headers_middleware, trace_id, RateLimiterState,
};
use crate::routes::{admin_auth, admin_claims, admin_coupons, claims, dashboard, health};
use crate::services::{AdminAuthService, SessionCookie};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stores: Stores,
    pub allocator: CouponAllocator,
    pub inventory: CouponInventory,
    pub auth: AdminAuthService,
    pub jwt: Arc<JwtConfig>,
    pub sessions: SessionCookie,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
}

impl AppState {
    /// Wires the services over the given stores.
    pub fn new(config: Config, stores: Stores) -> Result<Self, JwtError> {
        let config = Arc::new(config);

        let jwt = Arc::new(JwtConfig::new(
            &config.jwt.secret,
            config.jwt.token_expiry_secs,
            config.jwt.leeway_secs,
        )?);

        // Rate limiting is enabled when rate_limit_per_minute > 0
        let rate_limiter = if config.security.rate_limit_per_minute > 0 {
            Some(Arc::new(RateLimiterState::new(
                config.security.rate_limit_per_minute,
            )))
        } else {
            None
        };

        let allocator = CouponAllocator::new(
            stores.coupons.clone(),
            stores.claims.clone(),
            config.claims.policy(),
        );
        let inventory = CouponInventory::new(
            stores.coupons.clone(),
            stores.claims.clone(),
            config.limits.max_bulk_coupons,
        );
        let auth = AdminAuthService::new(
            stores.admins.clone(),
            jwt.clone(),
            config.admin.allow_registration,
        );

        Ok(Self {
            sessions: SessionCookie::new(&config.claims),
            config,
            stores,
            allocator,
            inventory,
            auth,
            jwt,
            rate_limiter,
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        // Production: only allow specified origins. Credentials are needed
        // for the session cookie, which rules out wildcard headers.
        use axum::http::{header, HeaderName, Method};
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        let session_header = HeaderName::try_from(config.claims.session_header.as_str())
            .unwrap_or(header::COOKIE);
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, session_header])
            .allow_credentials(true)
    };

    // Claim routes for anonymous users
    // Middleware order: session runs first, then rate limiting
    let user_routes = Router::new()
        .route("/api/v1/user/coupons", get(claims::list_available))
        .route("/api/v1/user/eligibility", get(claims::check_eligibility))
        .route("/api/v1/user/claim/:coupon_id", post(claims::claim_coupon))
        .route("/api/v1/user/claim-next", post(claims::claim_next))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(state.clone(), ensure_session));

    // Admin sign-up and sign-in (no token yet)
    let admin_public_routes = Router::new()
        .route("/api/v1/admin/register", post(admin_auth::register))
        .route("/api/v1/admin/login", post(admin_auth::login))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    // Admin routes (require admin JWT)
    let admin_routes = Router::new()
        .route("/api/v1/admin/profile", get(admin_auth::profile))
        .route(
            "/api/v1/admin/coupons",
            get(admin_coupons::list_coupons).post(admin_coupons::create_coupon),
        )
        .route(
            "/api/v1/admin/coupons/bulk",
            post(admin_coupons::create_coupons_bulk),
        )
        .route(
            "/api/v1/admin/coupons/:id",
            get(admin_coupons::get_coupon)
                .put(admin_coupons::update_coupon)
                .delete(admin_coupons::delete_coupon),
        )
        .route(
            "/api/v1/admin/coupons/:id/toggle",
            patch(admin_coupons::toggle_coupon),
        )
        .route("/api/v1/admin/claims", get(admin_claims::list_claims))
        .route("/api/v1/admin/dashboard", get(dashboard::get_dashboard))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    // Merge all routes
    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_public_routes)
        .merge(admin_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware)) // Prometheus metrics
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id)) // Request ID and logging
        .layer(cors)
        .with_state(state)
}
