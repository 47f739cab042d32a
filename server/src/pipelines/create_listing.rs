// haven/server/src/pipelines/create_listing.rs

use crate::errors::AppError;
use crate::gating;
use crate::models::{Listing, Package, User};
use crate::pipelines::common_steps::{generate_listing_slug, required, validate_listing_draft};
use crate::pipelines::contexts::CreateListingCtx;
use crate::seo;
use chrono::Utc;
use haven_flow::{Control, Flow, FlowCtx, FlowRegistry};
use tracing::{event, info, warn, Level};
use uuid::Uuid;

pub fn register_flow(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<CreateListingCtx, AppError>::new(&[
    ("validate_input", false, None),
    ("load_owner", false, None),
    ("check_role", false, None),
    ("check_quota", false, None),
    ("generate_slug", false, None),
    ("prepare_seo", false, None),
    ("persist_listing", false, None),
  ])
  .named("create_listing");

  flow.on("validate_input", |ctx: FlowCtx<CreateListingCtx>| {
    Box::pin(async move {
      let draft = ctx.read().draft.clone();
      let valid = validate_listing_draft(&draft)?;
      event!(Level::DEBUG, property_type = %valid.property_type, "Listing input validated.");
      ctx.write().validated = Some(valid);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("load_owner", |ctx: FlowCtx<CreateListingCtx>| {
    Box::pin(async move {
      let (owner_id, pool) = {
        let guard = ctx.read();
        (guard.owner_id, guard.app_state.db_pool.clone())
      };

      let owner = User::find_by_id(&pool, owner_id)
        .await?
        .ok_or_else(|| AppError::Auth("Account no longer exists.".to_string()))?;
      let package = Package::for_user(&pool, owner.package_id).await?;

      let mut guard = ctx.write();
      guard.owner = Some(owner);
      guard.package = package;
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("check_role", |ctx: FlowCtx<CreateListingCtx>| {
    Box::pin(async move {
      let owner = required(&ctx.read().owner, "owner")?;
      if !gating::can_create_listings(owner.role) {
        warn!(user_id = %owner.id, role = %owner.role, "Listing creation denied for role.");
        return Err(AppError::Forbidden("Only agents and experts can create listings.".to_string()));
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("check_quota", |ctx: FlowCtx<CreateListingCtx>| {
    Box::pin(async move {
      let (owner, package, pool) = {
        let guard = ctx.read();
        (required(&guard.owner, "owner")?, guard.package.clone(), guard.app_state.db_pool.clone())
      };

      let used = Listing::count_for_quota(&pool, owner.id).await?;
      let quota = gating::check_listing_quota(owner.role, package.as_ref(), owner.subscription_status, used)?;
      event!(Level::DEBUG, used = quota.used, limit = quota.limit, "Listing quota checked.");
      ctx.write().quota = Some(quota);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("generate_slug", |ctx: FlowCtx<CreateListingCtx>| {
    Box::pin(async move {
      let (valid, pool) = {
        let guard = ctx.read();
        (required(&guard.validated, "validated listing")?, guard.app_state.db_pool.clone())
      };

      let slug = generate_listing_slug(&pool, &valid.draft.title, &valid.draft.city, &valid.draft.state, None).await?;
      ctx.write().slug = Some(slug);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("prepare_seo", |ctx: FlowCtx<CreateListingCtx>| {
    Box::pin(async move {
      let (valid, slug, owner_id) = {
        let guard = ctx.read();
        (required(&guard.validated, "validated listing")?, required(&guard.slug, "slug")?, guard.owner_id)
      };

      let now = Utc::now();
      let d = valid.draft;
      let mut listing = Listing {
        id: Uuid::new_v4(),
        owner_id,
        title: d.title,
        slug,
        description: d.description,
        property_type: valid.property_type,
        listing_type: valid.listing_type,
        status: valid.status,
        price_cents: d.price_cents,
        bedrooms: d.bedrooms,
        bathrooms: d.bathrooms,
        square_feet: d.square_feet,
        year_built: d.year_built,
        address_line: d.address_line.trim().to_string(),
        city: d.city,
        state: d.state,
        postal_code: d.postal_code,
        latitude: d.latitude,
        longitude: d.longitude,
        features: d.features,
        meta_description: String::new(),
        is_featured: false,
        view_count: 0,
        created_at: now,
        updated_at: now,
      };
      listing.meta_description = seo::meta_description(&listing);

      let mut guard = ctx.write();
      guard.meta_description = Some(listing.meta_description.clone());
      guard.listing = Some(listing);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("persist_listing", |ctx: FlowCtx<CreateListingCtx>| {
    Box::pin(async move {
      let (listing, owner, package, pool) = {
        let guard = ctx.read();
        (
          required(&guard.listing, "prepared listing")?,
          required(&guard.owner, "owner")?,
          guard.package.clone(),
          guard.app_state.db_pool.clone(),
        )
      };

      let mut tx = pool.begin().await?;
      // Lock the owner row so concurrent creates see each other's count.
      sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(owner.id)
        .execute(&mut *tx)
        .await?;
      let used = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM listings WHERE owner_id = $1 AND status <> 'archived'")
        .bind(owner.id)
        .fetch_one(&mut *tx)
        .await?;
      gating::check_listing_quota(owner.role, package.as_ref(), owner.subscription_status, used)?;

      let saved = sqlx::query_as::<_, Listing>(
        "INSERT INTO listings (
           id, owner_id, title, slug, description, property_type, listing_type, status, price_cents,
           bedrooms, bathrooms, square_feet, year_built, address_line, city, state, postal_code,
           latitude, longitude, features, meta_description
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
         RETURNING *",
      )
      .bind(listing.id)
      .bind(listing.owner_id)
      .bind(&listing.title)
      .bind(&listing.slug)
      .bind(&listing.description)
      .bind(listing.property_type)
      .bind(listing.listing_type)
      .bind(listing.status)
      .bind(listing.price_cents)
      .bind(listing.bedrooms)
      .bind(listing.bathrooms)
      .bind(listing.square_feet)
      .bind(listing.year_built)
      .bind(&listing.address_line)
      .bind(&listing.city)
      .bind(&listing.state)
      .bind(&listing.postal_code)
      .bind(listing.latitude)
      .bind(listing.longitude)
      .bind(&listing.features)
      .bind(&listing.meta_description)
      .fetch_one(&mut *tx)
      .await?;
      tx.commit().await?;

      info!(listing_id = %saved.id, slug = %saved.slug, owner_id = %owner.id, "Listing created.");
      ctx.write().listing = Some(saved);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  registry.register(flow);
}
