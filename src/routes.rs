use std::sync::Arc;

use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;

use crate::{api::sync, config::Config};

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let sync_limiter = Arc::new(build_limiter(config.rate_sync_per_min));

    cfg.service(
        web::scope(&config.api_prefix).service(
            web::scope("/devices")
                // /devices/sync-status
                .service(web::resource("/sync-status").route(web::get().to(sync::sync_status)))
                // /devices/{id}/sync, operator-triggered, rate limited
                .service(
                    web::resource("/{id}/sync")
                        .wrap(sync_limiter.clone())
                        .route(web::post().to(sync::trigger_sync)),
                )
                // /devices/{id}/sync-users
                .service(
                    web::resource("/{id}/sync-users")
                        .wrap(sync_limiter)
                        .route(web::post().to(sync::sync_users)),
                ),
        ),
    );
}
