// haven/server/src/web/routes.rs

use crate::web::handlers::{
  agent_handlers, auth_handlers, billing_handlers, conversation_handlers, favorite_handlers, image_handlers,
  lead_handlers, listing_handlers, package_handlers, public_handlers, user_handlers, webhook_handlers,
};
use actix_web::web;

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .route("/sitemap.xml", web::get().to(public_handlers::sitemap_handler))
    .route("/uploads/{key:.*}", web::get().to(public_handlers::upload_handler))
    .service(
      web::scope("/api/v1")
        .route("/health", web::get().to(public_handlers::health_handler))
        .service(
          web::scope("/auth")
            .route("/register", web::post().to(auth_handlers::register_handler))
            .route("/login", web::post().to(auth_handlers::login_handler))
            .route("/verify-email", web::post().to(auth_handlers::verify_email_handler))
            .route("/me", web::get().to(auth_handlers::me_handler)),
        )
        .service(
          web::scope("/users/me")
            .route("", web::put().to(user_handlers::update_profile_handler))
            .route("/listings", web::get().to(user_handlers::my_listings_handler))
            .route("/favorites", web::get().to(user_handlers::my_favorites_handler))
            .route("/leads", web::get().to(user_handlers::my_leads_handler)),
        )
        .route("/agents/{id}", web::get().to(agent_handlers::agent_profile_handler))
        .service(
          web::scope("/packages")
            .route("", web::get().to(package_handlers::list_packages_handler))
            .route("/{id}", web::get().to(package_handlers::get_package_handler)),
        )
        .service(
          web::scope("/listings")
            .route("", web::get().to(listing_handlers::search_listings_handler))
            .route("", web::post().to(listing_handlers::create_listing_handler))
            // Registered before `/{slug}` so "quota" is not read as a slug.
            .route("/quota", web::get().to(listing_handlers::quota_handler))
            .route("/{slug}", web::get().to(listing_handlers::listing_detail_handler))
            .route("/{id}", web::put().to(listing_handlers::update_listing_handler))
            .route("/{id}", web::delete().to(listing_handlers::delete_listing_handler))
            .route("/{id}/images", web::post().to(image_handlers::upload_image_handler))
            .route("/{id}/images/{image_id}", web::delete().to(image_handlers::delete_image_handler))
            .route("/{id}/favorite", web::post().to(favorite_handlers::toggle_favorite_handler))
            .route("/{id}/leads", web::post().to(lead_handlers::submit_lead_handler)),
        )
        .route("/leads/{id}", web::patch().to(lead_handlers::update_lead_status_handler))
        .service(
          web::scope("/conversations")
            .route("", web::get().to(conversation_handlers::list_conversations_handler))
            .route("/{id}/messages", web::get().to(conversation_handlers::list_messages_handler))
            .route("/{id}/messages", web::post().to(conversation_handlers::send_message_handler)),
        )
        .service(
          web::scope("/billing")
            .route("/checkout", web::post().to(billing_handlers::checkout_handler))
            .route("/upgrade", web::post().to(billing_handlers::upgrade_handler))
            .route("/subscription", web::get().to(billing_handlers::subscription_handler)),
        )
        .route("/webhooks/stripe", web::post().to(webhook_handlers::stripe_webhook_handler)),
    );
}
