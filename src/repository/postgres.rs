use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, FromRow, PgPool, Postgres, QueryBuilder};
use tracing::warn;
use uuid::Uuid;

use super::{
    corrupt_row, AccountRepository, ClickRepository, CreatedWindow, ListingRepository,
    ListingStats, PartnerRepository, SubscriptionRepository,
};
use crate::error::{Error, Result};
use crate::models::{
    account::{Account, NewAccount},
    choices::{Category, ClickType, DocumentType, UnknownChoice},
    click::{ClickRecord, ListingClicks},
    listing::{Listing, NewListing, PrepChecklistItem},
    partner::{NewPartner, Partner},
    subscription::{SubscribeOutcome, Subscription, Transition, TransitionOutcome},
};
use crate::services::filter::{default_ordering, push_order_by, ListingQuery, Page};

const LISTING_COLUMNS: &str = "id, slug, title, organization_name, description, category, \
    location, city, work_mode, commitment, target_group, education_level, funding_type, \
    is_paid, stipend_min, stipend_max, required_documents, application_type, external_url, \
    application_email, email_subject_line, brochure_url, prep_checklist, deadline, \
    is_rolling, is_verified, is_active, is_featured, raw_data, created_by, created_at, \
    updated_at";

const SUBSCRIPTION_COLUMNS: &str =
    "id, email, is_active, confirmation_token, created_at, confirmed_at, last_notified_at";

const ACCOUNT_COLUMNS: &str = "id, email, display_name, is_active, is_superuser, \
    email_notifications, created_at, updated_at";

const PARTNER_COLUMNS: &str = "id, name, logo_url, website_url, is_featured, created_at";

#[derive(Debug, FromRow)]
struct ListingRow {
    id: i64,
    slug: String,
    title: String,
    organization_name: String,
    description: String,
    category: String,
    location: Option<String>,
    city: Option<String>,
    work_mode: Option<String>,
    commitment: Option<String>,
    target_group: Option<String>,
    education_level: Option<String>,
    funding_type: Option<String>,
    is_paid: bool,
    stipend_min: Option<Decimal>,
    stipend_max: Option<Decimal>,
    required_documents: Vec<String>,
    application_type: String,
    external_url: Option<String>,
    application_email: Option<String>,
    email_subject_line: Option<String>,
    brochure_url: Option<String>,
    prep_checklist: Json<Vec<PrepChecklistItem>>,
    deadline: Option<DateTime<Utc>>,
    is_rolling: bool,
    is_verified: bool,
    is_active: bool,
    is_featured: bool,
    raw_data: String,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn optional<T>(value: Option<String>) -> std::result::Result<Option<T>, UnknownChoice>
where
    T: FromStr<Err = UnknownChoice>,
{
    value.map(|v| v.parse()).transpose()
}

impl TryFrom<ListingRow> for Listing {
    type Error = UnknownChoice;

    fn try_from(row: ListingRow) -> std::result::Result<Self, Self::Error> {
        Ok(Listing {
            id: row.id,
            slug: row.slug,
            title: row.title,
            organization_name: row.organization_name,
            description: row.description,
            category: row.category.parse()?,
            location: optional(row.location)?,
            city: row.city,
            work_mode: optional(row.work_mode)?,
            commitment: optional(row.commitment)?,
            target_group: optional(row.target_group)?,
            education_level: optional(row.education_level)?,
            funding_type: optional(row.funding_type)?,
            is_paid: row.is_paid,
            stipend_min: row.stipend_min,
            stipend_max: row.stipend_max,
            required_documents: row
                .required_documents
                .iter()
                .map(|d| d.parse::<DocumentType>())
                .collect::<std::result::Result<Vec<_>, _>>()?,
            application_type: row.application_type.parse()?,
            external_url: row.external_url,
            application_email: row.application_email,
            email_subject_line: row.email_subject_line,
            brochure_url: row.brochure_url,
            prep_checklist: row.prep_checklist.0,
            deadline: row.deadline,
            is_rolling: row.is_rolling,
            is_verified: row.is_verified,
            is_active: row.is_active,
            is_featured: row.is_featured,
            raw_data: row.raw_data,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode_listing(row: ListingRow) -> Result<Listing> {
    Listing::try_from(row).map_err(corrupt_row)
}

fn decode_listings(rows: Vec<ListingRow>) -> Result<Vec<Listing>> {
    rows.into_iter().map(decode_listing).collect()
}

fn unique_violation(err: sqlx::Error, message: impl FnOnce() -> String) -> Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => Error::Conflict(message()),
        _ => err.into(),
    }
}

fn documents(listing_documents: &[DocumentType]) -> Vec<String> {
    listing_documents
        .iter()
        .map(|d| d.as_str().to_string())
        .collect()
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_subscription_by_email(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        email: &str,
    ) -> Result<Subscription> {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {} FROM subscriptions WHERE email = $1 FOR UPDATE",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(email)
        .fetch_one(&mut **tx)
        .await?;
        Ok(subscription)
    }

    async fn insert_subscription_if_absent(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        candidate: &Subscription,
    ) -> Result<Option<Subscription>> {
        let inserted = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            INSERT INTO subscriptions (id, email, is_active, confirmation_token, created_at, confirmed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO NOTHING
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(candidate.id)
        .bind(&candidate.email)
        .bind(candidate.is_active)
        .bind(&candidate.confirmation_token)
        .bind(candidate.created_at)
        .bind(candidate.confirmed_at)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(inserted)
    }

    async fn write_subscription_state(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        subscription: &Subscription,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET is_active = $2, confirmation_token = $3, confirmed_at = $4
            WHERE id = $1
            "#,
        )
        .bind(subscription.id)
        .bind(subscription.is_active)
        .bind(&subscription.confirmation_token)
        .bind(subscription.confirmed_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ListingRepository for PgStore {
    async fn insert(&self, listing: NewListing) -> Result<Listing> {
        let slug = listing.slug.clone();
        let row = sqlx::query_as::<_, ListingRow>(&format!(
            r#"
            INSERT INTO listings (
                slug, title, organization_name, description, category,
                location, city, work_mode, commitment, target_group,
                education_level, funding_type, is_paid, stipend_min, stipend_max,
                required_documents, application_type, external_url, application_email, email_subject_line,
                brochure_url, prep_checklist, deadline, is_rolling, is_verified,
                is_active, is_featured, raw_data, created_by
            ) VALUES (
                $1,$2,$3,$4,$5,
                $6,$7,$8,$9,$10,
                $11,$12,$13,$14,$15,
                $16,$17,$18,$19,$20,
                $21,$22,$23,$24,$25,
                $26,$27,$28,$29
            )
            RETURNING {}
            "#,
            LISTING_COLUMNS
        ))
        .bind(&listing.slug)
        .bind(&listing.title)
        .bind(&listing.organization_name)
        .bind(&listing.description)
        .bind(listing.category.as_str())
        .bind(listing.location.map(|v| v.as_str()))
        .bind(&listing.city)
        .bind(listing.work_mode.map(|v| v.as_str()))
        .bind(listing.commitment.map(|v| v.as_str()))
        .bind(listing.target_group.map(|v| v.as_str()))
        .bind(listing.education_level.map(|v| v.as_str()))
        .bind(listing.funding_type.map(|v| v.as_str()))
        .bind(listing.is_paid)
        .bind(listing.stipend_min)
        .bind(listing.stipend_max)
        .bind(documents(&listing.required_documents))
        .bind(listing.application_type.as_str())
        .bind(&listing.external_url)
        .bind(&listing.application_email)
        .bind(&listing.email_subject_line)
        .bind(&listing.brochure_url)
        .bind(Json(&listing.prep_checklist))
        .bind(listing.deadline)
        .bind(listing.is_rolling)
        .bind(listing.is_verified)
        .bind(listing.is_active)
        .bind(listing.is_featured)
        .bind(&listing.raw_data)
        .bind(listing.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, || format!("slug `{}` is taken", slug)))?;

        decode_listing(row)
    }

    async fn save(&self, listing: &Listing) -> Result<Listing> {
        let row = sqlx::query_as::<_, ListingRow>(&format!(
            r#"
            UPDATE listings
            SET
                slug = $2,
                title = $3,
                organization_name = $4,
                description = $5,
                category = $6,
                location = $7,
                city = $8,
                work_mode = $9,
                commitment = $10,
                target_group = $11,
                education_level = $12,
                funding_type = $13,
                is_paid = $14,
                stipend_min = $15,
                stipend_max = $16,
                required_documents = $17,
                application_type = $18,
                external_url = $19,
                application_email = $20,
                email_subject_line = $21,
                brochure_url = $22,
                prep_checklist = $23,
                deadline = $24,
                is_rolling = $25,
                is_verified = $26,
                is_active = $27,
                is_featured = $28,
                raw_data = $29,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            LISTING_COLUMNS
        ))
        .bind(listing.id)
        .bind(&listing.slug)
        .bind(&listing.title)
        .bind(&listing.organization_name)
        .bind(&listing.description)
        .bind(listing.category.as_str())
        .bind(listing.location.map(|v| v.as_str()))
        .bind(&listing.city)
        .bind(listing.work_mode.map(|v| v.as_str()))
        .bind(listing.commitment.map(|v| v.as_str()))
        .bind(listing.target_group.map(|v| v.as_str()))
        .bind(listing.education_level.map(|v| v.as_str()))
        .bind(listing.funding_type.map(|v| v.as_str()))
        .bind(listing.is_paid)
        .bind(listing.stipend_min)
        .bind(listing.stipend_max)
        .bind(documents(&listing.required_documents))
        .bind(listing.application_type.as_str())
        .bind(&listing.external_url)
        .bind(&listing.application_email)
        .bind(&listing.email_subject_line)
        .bind(&listing.brochure_url)
        .bind(Json(&listing.prep_checklist))
        .bind(listing.deadline)
        .bind(listing.is_rolling)
        .bind(listing.is_verified)
        .bind(listing.is_active)
        .bind(listing.is_featured)
        .bind(&listing.raw_data)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, || format!("slug `{}` is taken", listing.slug)))?;

        decode_listing(row)
    }

    async fn get(&self, id: i64) -> Result<Option<Listing>> {
        let row = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {} FROM listings WHERE id = $1",
            LISTING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(decode_listing).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Listing>> {
        let row = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {} FROM listings WHERE slug = $1",
            LISTING_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        row.map(decode_listing).transpose()
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM listings WHERE slug = $1)")
                .bind(slug)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn search(&self, query: &ListingQuery, now: DateTime<Utc>) -> Result<Page<Listing>> {
        let mut count_qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM listings");
        query.push_conditions(&mut count_qb, now);
        let (total,): (i64,) = count_qb.build_query_as::<(i64,)>().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM listings", LISTING_COLUMNS));
        query.push_conditions(&mut qb, now);
        push_order_by(&mut qb, &query.ordering);
        qb.push(" LIMIT ")
            .push_bind(query.page_size)
            .push(" OFFSET ")
            .push_bind(query.offset());
        let rows: Vec<ListingRow> = qb.build_query_as::<ListingRow>().fetch_all(&self.pool).await?;

        Ok(Page {
            items: decode_listings(rows)?,
            total,
            page: query.page,
            page_size: query.page_size,
        })
    }

    async fn featured(&self, limit: i64) -> Result<Vec<Listing>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM listings WHERE is_active = TRUE AND is_featured = TRUE",
            LISTING_COLUMNS
        ));
        push_order_by(&mut qb, &default_ordering());
        qb.push(" LIMIT ").push_bind(limit);
        let rows: Vec<ListingRow> = qb.build_query_as::<ListingRow>().fetch_all(&self.pool).await?;
        decode_listings(rows)
    }

    async fn created_in(&self, window: CreatedWindow) -> Result<Vec<Listing>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM listings WHERE is_active = TRUE AND created_at ",
            LISTING_COLUMNS
        ));
        qb.push(if window.start_inclusive { ">= " } else { "> " })
            .push_bind(window.start)
            .push(" AND created_at <= ")
            .push_bind(window.end)
            .push(" ORDER BY created_at ASC, id ASC");
        let rows: Vec<ListingRow> = qb.build_query_as::<ListingRow>().fetch_all(&self.pool).await?;
        decode_listings(rows)
    }

    async fn stats(&self) -> Result<ListingStats> {
        let (active, verified, featured): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE is_verified),
                COUNT(*) FILTER (WHERE is_featured)
            FROM listings
            WHERE is_active = TRUE
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(ListingStats {
            active,
            verified,
            featured,
        })
    }

    async fn category_counts(&self) -> Result<HashMap<Category, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT category, COUNT(*) FROM listings WHERE is_active = TRUE GROUP BY category",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = HashMap::new();
        for (category, total) in rows {
            match category.parse::<Category>() {
                Ok(category) => {
                    counts.insert(category, total);
                }
                Err(err) => warn!(error = %err, "skipping listings with unknown category"),
            }
        }
        Ok(counts)
    }

    async fn active_count_by_organization(&self) -> Result<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT organization_name, COUNT(*)
            FROM listings
            WHERE is_active = TRUE
            GROUP BY organization_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }
}

#[async_trait::async_trait]
impl ClickRepository for PgStore {
    async fn increment(
        &self,
        listing_id: i64,
        click_type: ClickType,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let result: std::result::Result<(i64,), sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO click_analytics (listing_id, click_type, click_count, last_clicked_at)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (listing_id, click_type)
            DO UPDATE SET
                click_count = click_analytics.click_count + 1,
                last_clicked_at = EXCLUDED.last_clicked_at
            RETURNING click_count
            "#,
        )
        .bind(listing_id)
        .bind(click_type.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok((count,)) => Ok(count),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => Err(
                Error::NotFound(format!("listing {} not found", listing_id)),
            ),
            Err(err) => Err(err.into()),
        }
    }

    async fn for_listing(&self, listing_id: i64) -> Result<Vec<ClickRecord>> {
        let rows: Vec<(i64, String, i64, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT listing_id, click_type, click_count, last_clicked_at
            FROM click_analytics
            WHERE listing_id = $1
            "#,
        )
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records = rows
            .into_iter()
            .map(|(listing_id, click_type, click_count, last_clicked_at)| {
                Ok(ClickRecord {
                    listing_id,
                    click_type: click_type.parse().map_err(corrupt_row)?,
                    click_count,
                    last_clicked_at,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        records.sort_by_key(|r| r.click_type);
        Ok(records)
    }

    async fn top_listings(&self, limit: i64) -> Result<Vec<ListingClicks>> {
        let rows: Vec<(i64, String, String, i64)> = sqlx::query_as(
            r#"
            SELECT l.id, l.title, l.organization_name, SUM(c.click_count)::BIGINT AS total_clicks
            FROM listings l
            JOIN click_analytics c ON c.listing_id = l.id
            GROUP BY l.id
            ORDER BY total_clicks DESC, l.id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, title, organization, total_clicks)| ListingClicks {
                id,
                title,
                organization,
                total_clicks,
            })
            .collect())
    }

    async fn total_clicks(&self) -> Result<i64> {
        let (total,): (i64,) =
            sqlx::query_as("SELECT COALESCE(SUM(click_count), 0)::BIGINT FROM click_analytics")
                .fetch_one(&self.pool)
                .await?;
        Ok(total)
    }
}

#[async_trait::async_trait]
impl SubscriptionRepository for PgStore {
    async fn subscribe(
        &self,
        email: &str,
        fresh_token: String,
        now: DateTime<Utc>,
    ) -> Result<(Subscription, SubscribeOutcome)> {
        let mut tx = self.pool.begin().await?;
        let candidate = Subscription::pending(email.to_string(), fresh_token.clone(), now);
        if let Some(created) = Self::insert_subscription_if_absent(&mut tx, &candidate).await? {
            tx.commit().await?;
            return Ok((created, SubscribeOutcome::Created));
        }

        let mut existing = Self::lock_subscription_by_email(&mut tx, email).await?;
        let outcome = existing.resubscribe(fresh_token);
        if outcome == SubscribeOutcome::Resent {
            Self::write_subscription_state(&mut tx, &existing).await?;
        }
        tx.commit().await?;
        Ok((existing, outcome))
    }

    async fn transition(
        &self,
        token: &str,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Option<(Subscription, TransitionOutcome)>> {
        let mut tx = self.pool.begin().await?;
        let found = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {} FROM subscriptions WHERE confirmation_token = $1 FOR UPDATE",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut subscription) = found else {
            return Ok(None);
        };
        let outcome = transition.apply(&mut subscription, now);
        if outcome.changed() {
            Self::write_subscription_state(&mut tx, &subscription).await?;
        }
        tx.commit().await?;
        Ok(Some((subscription, outcome)))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Subscription>> {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(subscription)
    }

    async fn active(&self) -> Result<Vec<Subscription>> {
        let subscriptions = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {} FROM subscriptions WHERE is_active = TRUE ORDER BY created_at, id",
            SUBSCRIPTION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(subscriptions)
    }

    async fn advance_watermark(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE subscriptions SET last_notified_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("subscription {} not found", id)));
        }
        Ok(())
    }

    async fn ensure_confirmed(
        &self,
        email: &str,
        fresh_token: String,
        now: DateTime<Utc>,
    ) -> Result<Subscription> {
        let mut tx = self.pool.begin().await?;
        let mut candidate = Subscription::pending(email.to_string(), fresh_token, now);
        candidate.ensure_confirmed(now);
        if let Some(created) = Self::insert_subscription_if_absent(&mut tx, &candidate).await? {
            tx.commit().await?;
            return Ok(created);
        }

        let mut existing = Self::lock_subscription_by_email(&mut tx, email).await?;
        if existing.ensure_confirmed(now) {
            Self::write_subscription_state(&mut tx, &existing).await?;
        }
        tx.commit().await?;
        Ok(existing)
    }
}

#[async_trait::async_trait]
impl AccountRepository for PgStore {
    async fn insert(&self, account: NewAccount) -> Result<Account> {
        let email = account.email.clone();
        let stored = sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts (email, display_name, is_active, is_superuser, email_notifications)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(&account.email)
        .bind(&account.display_name)
        .bind(account.is_active)
        .bind(account.is_superuser)
        .bind(account.email_notifications)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, || format!("account `{}` already exists", email)))?;
        Ok(stored)
    }

    async fn save(&self, account: &Account) -> Result<Account> {
        let stored = sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts
            SET email = $2, display_name = $3, is_active = $4, is_superuser = $5,
                email_notifications = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.display_name)
        .bind(account.is_active)
        .bind(account.is_superuser)
        .bind(account.email_notifications)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            unique_violation(e, || format!("account `{}` already exists", account.email))
        })?;
        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn list(&self) -> Result<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts ORDER BY created_at, id",
            ACCOUNT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(accounts)
    }
}

#[async_trait::async_trait]
impl PartnerRepository for PgStore {
    async fn insert(&self, partner: NewPartner) -> Result<Partner> {
        let name = partner.name.clone();
        let stored = sqlx::query_as::<_, Partner>(&format!(
            r#"
            INSERT INTO partners (name, logo_url, website_url, is_featured)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            PARTNER_COLUMNS
        ))
        .bind(&partner.name)
        .bind(&partner.logo_url)
        .bind(&partner.website_url)
        .bind(partner.is_featured)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, || format!("partner `{}` already exists", name)))?;
        Ok(stored)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM partners WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<Partner>> {
        let partners = sqlx::query_as::<_, Partner>(&format!(
            "SELECT {} FROM partners ORDER BY is_featured DESC, name ASC",
            PARTNER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(partners)
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM partners")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Runs against `DATABASE_URL`: `cargo test -- --ignored`.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::choices::ApplicationType;

    async fn store() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.expect("connect");
        sqlx::migrate!("./migrations").run(&pool).await.expect("migrate");
        PgStore::new(pool)
    }

    fn draft(slug: &str) -> NewListing {
        NewListing {
            slug: slug.to_string(),
            title: "Community Health Worker".to_string(),
            organization_name: "IRC".to_string(),
            description: String::new(),
            category: Category::Job,
            location: None,
            city: Some("Kakuma".to_string()),
            work_mode: None,
            commitment: None,
            target_group: None,
            education_level: None,
            funding_type: None,
            is_paid: true,
            stipend_min: None,
            stipend_max: None,
            required_documents: vec![DocumentType::Ctd],
            application_type: ApplicationType::Link,
            external_url: Some("https://example.org/apply".to_string()),
            application_email: None,
            email_subject_line: None,
            brochure_url: None,
            prep_checklist: Vec::new(),
            deadline: None,
            is_rolling: false,
            is_verified: true,
            is_active: true,
            is_featured: false,
            raw_data: String::new(),
            created_by: None,
        }
    }

    #[tokio::test]
    #[ignore]
    async fn click_upsert_counts_per_type() {
        let store = store().await;
        let slug = format!("chw-{}", Uuid::new_v4());
        let listing = ListingRepository::insert(&store, draft(&slug)).await.unwrap();
        let now = Utc::now();

        assert_eq!(store.increment(listing.id, ClickType::Apply, now).await.unwrap(), 1);
        assert_eq!(store.increment(listing.id, ClickType::Apply, now).await.unwrap(), 2);
        assert_eq!(
            store.increment(listing.id, ClickType::ViewDetails, now).await.unwrap(),
            1
        );
        assert!(matches!(
            store.increment(-1, ClickType::Apply, now).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    #[ignore]
    async fn docs_filter_uses_array_membership() {
        let store = store().await;
        let slug = format!("chw-{}", Uuid::new_v4());
        let listing = ListingRepository::insert(&store, draft(&slug)).await.unwrap();

        let mut params = HashMap::new();
        params.insert("docs".to_string(), "ctd".to_string());
        params.insert("search".to_string(), "kakuma".to_string());
        params.insert("page_size".to_string(), "100".to_string());
        let query = ListingQuery::from_params(&params, 20).unwrap();
        let page = store.search(&query, Utc::now()).await.unwrap();
        assert!(page.items.iter().any(|l| l.id == listing.id));
    }

    #[tokio::test]
    #[ignore]
    async fn transitions_lock_and_update_rows() {
        let store = store().await;
        let email = format!("{}@example.org", Uuid::new_v4());
        let now = Utc::now();
        let (created, outcome) = store
            .subscribe(&email, format!("tok-{}", Uuid::new_v4()), now)
            .await
            .unwrap();
        assert_eq!(outcome, SubscribeOutcome::Created);

        let (_, outcome) = store
            .transition(&created.confirmation_token, Transition::Confirm, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::Confirmed);

        let (_, outcome) = store
            .subscribe(&email, format!("tok-{}", Uuid::new_v4()), now)
            .await
            .unwrap();
        assert_eq!(outcome, SubscribeOutcome::AlreadySubscribed);
    }
}
