mod common;

use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, sea_query::Expr};
use utility_billing_api::{
    dto::requests::{ResolveOutcome, UpdateLineRequest},
    entity::{RequestStatus, Requests, Role, requests},
    error::AppError,
    routes::params::RequestListQuery,
    services::{ledger_service, request_service},
};

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

#[tokio::test]
async fn increments_keep_snapshot_and_form_freezes_lines() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else { return Ok(()) };
    let dir = tempfile::tempdir()?;
    let state = common::setup_state(&url, dir.path()).await?;

    let manager = common::create_user(&state, Role::Manager, "x").await?;
    let buyer = common::create_user(&state, Role::Buyer, "x").await?;
    let electricity = common::create_service(&state, &manager, "Electricity", "3.6").await?;

    let first = request_service::add_to_draft(&state, &buyer, electricity, dec("300"))
        .await?
        .data
        .unwrap();
    assert_eq!(first.line.total, dec("1080.0"));
    assert_eq!(first.request.status, RequestStatus::Draft);

    let second = request_service::add_to_draft(&state, &buyer, electricity, dec("50"))
        .await?
        .data
        .unwrap();
    assert_eq!(second.request.id, first.request.id);
    assert_eq!(second.line.quantity, dec("350"));
    assert_eq!(second.line.total, dec("1260.0"));
    assert_eq!(second.request.total_cost, dec("1260.0"));

    let request_id = second.request.id;
    let formed = request_service::form_request(&state, &buyer, request_id)
        .await?
        .data
        .unwrap();
    assert_eq!(formed.status, RequestStatus::Formed);
    assert_eq!(formed.total_cost, dec("1260.0"));
    assert!(formed.formed_at.is_some());

    let err = request_service::add_line(&state, &buyer, request_id, electricity, dec("1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }), "{err:?}");

    // the next add opens a fresh draft
    let next = request_service::add_to_draft(&state, &buyer, electricity, dec("1"))
        .await?
        .data
        .unwrap();
    assert_ne!(next.request.id, request_id);

    Ok(())
}

#[tokio::test]
async fn create_or_get_draft_is_idempotent() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else { return Ok(()) };
    let dir = tempfile::tempdir()?;
    let state = common::setup_state(&url, dir.path()).await?;
    let buyer = common::create_user(&state, Role::Buyer, "x").await?;

    let a = request_service::create_or_get_draft(&state.orm, buyer.user_id).await?;
    let b = request_service::create_or_get_draft(&state.orm, buyer.user_id).await?;
    assert_eq!(a.id, b.id);
    assert_eq!(b.total_cost, Decimal::ZERO);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_never_lose_increments() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else { return Ok(()) };
    let dir = tempfile::tempdir()?;
    let state = common::setup_state(&url, dir.path()).await?;
    let manager = common::create_user(&state, Role::Manager, "x").await?;
    let buyer = common::create_user(&state, Role::Buyer, "x").await?;
    let water = common::create_service(&state, &manager, "Cold water", "2.5").await?;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = state.clone();
        let buyer = buyer.clone();
        handles.push(tokio::spawn(async move {
            request_service::add_to_draft(&state, &buyer, water, dec("1.5")).await
        }));
    }
    let mut request_ids = Vec::new();
    for handle in handles {
        let added = handle.await??.data.unwrap();
        request_ids.push(added.request.id);
    }
    request_ids.dedup();
    assert_eq!(request_ids.len(), 1, "all adds must land in one draft");

    let detail = request_service::get_request(&state, &buyer, request_ids[0])
        .await?
        .data
        .unwrap();
    assert_eq!(detail.lines.len(), 1);
    assert_eq!(detail.lines[0].quantity, dec("12"));
    assert_eq!(detail.lines[0].total, dec("30"));
    assert_eq!(detail.request.total_cost, dec("30"));
    Ok(())
}

#[tokio::test]
async fn line_updates_commute_and_total_tracks_lines() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else { return Ok(()) };
    let dir = tempfile::tempdir()?;
    let state = common::setup_state(&url, dir.path()).await?;
    let manager = common::create_user(&state, Role::Manager, "x").await?;
    let gas = common::create_service(&state, &manager, "Gas", "3.6").await?;
    let heat = common::create_service(&state, &manager, "Heating", "3.6").await?;

    let draft = request_service::add_to_draft(&state, &manager, gas, dec("300")).await?.data.unwrap();
    request_service::add_to_draft(&state, &manager, heat, dec("300")).await?;
    let id = draft.request.id;

    let qty = |q: &str| UpdateLineRequest { quantity: Some(dec(q)), tariff_override: None };
    let tariff = |t: &str| UpdateLineRequest { quantity: None, tariff_override: Some(dec(t)) };

    request_service::update_line(&state, &manager, id, gas, qty("5")).await?;
    let gas_line = request_service::update_line(&state, &manager, id, gas, tariff("10")).await?.data.unwrap();
    request_service::update_line(&state, &manager, id, heat, tariff("10")).await?;
    let heat_line = request_service::update_line(&state, &manager, id, heat, qty("5")).await?.data.unwrap();

    assert_eq!(gas_line.total, dec("50"));
    assert_eq!(heat_line.total, dec("50"));
    assert_eq!(heat_line.effective_tariff, dec("10"));

    let sum = ledger_service::sum_line_totals(&state.orm, id).await?;
    assert_eq!(sum, dec("100"));

    let empty = request_service::update_line(&state, &manager, id, gas, UpdateLineRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(empty, AppError::BadRequest(_)));

    let after_remove = request_service::remove_line(&state, &manager, id, gas).await?.data.unwrap();
    assert_eq!(after_remove.total_cost, dec("50"));
    // removing again is a no-op
    let again = request_service::remove_line(&state, &manager, id, gas).await?.data.unwrap();
    assert_eq!(again.total_cost, dec("50"));

    let missing = request_service::update_line(&state, &manager, id, gas, qty("1"))
        .await
        .unwrap_err();
    assert!(matches!(missing, AppError::NotFound));
    Ok(())
}

#[tokio::test]
async fn ownership_and_role_gate_transitions() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else { return Ok(()) };
    let dir = tempfile::tempdir()?;
    let state = common::setup_state(&url, dir.path()).await?;
    let manager = common::create_user(&state, Role::Manager, "x").await?;
    let owner = common::create_user(&state, Role::Buyer, "x").await?;
    let stranger = common::create_user(&state, Role::Buyer, "x").await?;
    let service = common::create_service(&state, &manager, "Hot water", "198.5").await?;

    let draft = request_service::add_to_draft(&state, &owner, service, dec("2")).await?.data.unwrap();
    let id = draft.request.id;

    for err in [
        request_service::form_request(&state, &stranger, id).await.unwrap_err(),
        request_service::delete_request(&state, &stranger, id).await.unwrap_err(),
        request_service::get_request(&state, &stranger, id).await.unwrap_err(),
    ] {
        assert!(matches!(err, AppError::Forbidden), "{err:?}");
    }

    // resolving a draft is a bad transition for a moderator, forbidden for a buyer
    let err = request_service::resolve_request(&state, &manager, id, ResolveOutcome::Accept)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
    let err = request_service::resolve_request(&state, &owner, id, ResolveOutcome::Accept)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    request_service::form_request(&state, &owner, id).await?;
    let completed = request_service::resolve_request(&state, &manager, id, ResolveOutcome::Accept)
        .await?
        .data
        .unwrap();
    assert_eq!(completed.status, RequestStatus::Completed);
    assert_eq!(completed.moderator_id, Some(manager.user_id));
    assert!(completed.resolved_at.is_some());
    assert_eq!(completed.total_cost, dec("397"));

    let err = request_service::resolve_request(&state, &manager, id, ResolveOutcome::Reject)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    let detail = request_service::get_request(&state, &manager, id).await?.data.unwrap();
    assert_eq!(detail.moderator_login.as_deref().map(|l| l.starts_with("manager-")), Some(true));
    Ok(())
}

#[tokio::test]
async fn deleted_drafts_disappear_from_reads() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else { return Ok(()) };
    let dir = tempfile::tempdir()?;
    let state = common::setup_state(&url, dir.path()).await?;
    let manager = common::create_user(&state, Role::Manager, "x").await?;
    let buyer = common::create_user(&state, Role::Buyer, "x").await?;
    let service = common::create_service(&state, &manager, "Waste removal", "120").await?;

    let draft = request_service::add_to_draft(&state, &buyer, service, dec("1")).await?.data.unwrap();
    let id = draft.request.id;

    let cart = request_service::cart_summary(&state, &buyer).await?.data.unwrap();
    assert_eq!(cart.draft_id, Some(id));
    assert_eq!(cart.line_count, 1);

    request_service::delete_request(&state, &buyer, id).await?;

    let err = request_service::get_request(&state, &buyer, id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    let err = request_service::delete_request(&state, &buyer, id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    let cart = request_service::cart_summary(&state, &buyer).await?.data.unwrap();
    assert_eq!(cart.draft_id, None);
    assert_eq!(cart.line_count, 0);

    let listed = request_service::list_requests(&state, &buyer, RequestListQuery::default())
        .await?
        .data
        .unwrap();
    assert!(listed.items.iter().all(|r| r.id != id));
    Ok(())
}

#[tokio::test]
async fn buyers_list_only_their_own_requests() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else { return Ok(()) };
    let dir = tempfile::tempdir()?;
    let state = common::setup_state(&url, dir.path()).await?;
    let manager = common::create_user(&state, Role::Manager, "x").await?;
    let alice = common::create_user(&state, Role::Buyer, "x").await?;
    let bob = common::create_user(&state, Role::Buyer, "x").await?;
    let service = common::create_service(&state, &manager, "Electricity", "1").await?;

    let a = request_service::add_to_draft(&state, &alice, service, dec("1")).await?.data.unwrap().request.id;
    let b = request_service::add_to_draft(&state, &bob, service, dec("1")).await?.data.unwrap().request.id;
    request_service::update_details(&state, &alice, a, Some("  12 Main St ".into())).await?;
    request_service::form_request(&state, &alice, a).await?;

    let query = || RequestListQuery {
        per_page: Some(100),
        ..Default::default()
    };
    let mine = request_service::list_requests(&state, &alice, query()).await?.data.unwrap();
    assert!(mine.items.iter().all(|r| r.creator_id == alice.user_id));
    let formed = mine.items.iter().find(|r| r.id == a).unwrap();
    assert_eq!(formed.address.as_deref(), Some("12 Main St"));

    let formed_only = request_service::list_requests(
        &state,
        &manager,
        RequestListQuery {
            status: Some(RequestStatus::Formed),
            per_page: Some(100),
            ..Default::default()
        },
    )
    .await?
    .data
    .unwrap();
    assert!(formed_only.items.iter().any(|r| r.id == a));
    assert!(formed_only.items.iter().all(|r| r.id != b));

    let today = chrono::Utc::now().date_naive();
    let dated = request_service::list_requests(
        &state,
        &alice,
        RequestListQuery {
            date_from: Some(today),
            date_to: Some(today),
            per_page: Some(100),
            ..Default::default()
        },
    )
    .await?
    .data
    .unwrap();
    assert!(dated.items.iter().any(|r| r.id == a));
    Ok(())
}

#[tokio::test]
async fn amounts_beyond_the_decimal_range_are_bad_requests() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else { return Ok(()) };
    let dir = tempfile::tempdir()?;
    let state = common::setup_state(&url, dir.path()).await?;
    let manager = common::create_user(&state, Role::Manager, "x").await?;
    let buyer = common::create_user(&state, Role::Buyer, "x").await?;
    let electricity = common::create_service(&state, &manager, "Electricity", "3.6").await?;
    let heating = common::create_service(&state, &manager, "Heating", "2").await?;
    let water = common::create_service(&state, &manager, "Water", "1").await?;

    let err = request_service::add_to_draft(&state, &buyer, electricity, dec("30000000000000000000000000000"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)), "{err:?}");

    let half = dec("20000000000000000000000000000");
    let first = request_service::add_to_draft(&state, &buyer, heating, half).await?.data.unwrap();
    assert_eq!(first.line.total, dec("40000000000000000000000000000"));

    // the increment itself would leave the range
    let err = request_service::add_to_draft(&state, &buyer, heating, half).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)), "{err:?}");

    // each line fits, the request total would not
    let err = request_service::add_to_draft(&state, &buyer, water, dec("40000000000000000000000000000"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)), "{err:?}");

    let err = request_service::update_line(
        &state,
        &manager,
        first.request.id,
        heating,
        UpdateLineRequest {
            quantity: None,
            tariff_override: Some(dec("10")),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)), "{err:?}");

    let detail = request_service::get_request(&state, &buyer, first.request.id).await?.data.unwrap();
    assert_eq!(detail.lines.len(), 1);
    assert_eq!(detail.lines[0].quantity, half);
    assert_eq!(detail.request.total_cost, dec("40000000000000000000000000000"));
    Ok(())
}

#[tokio::test]
async fn moderators_edit_lines_of_any_draft() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else { return Ok(()) };
    let dir = tempfile::tempdir()?;
    let state = common::setup_state(&url, dir.path()).await?;
    let manager = common::create_user(&state, Role::Manager, "x").await?;
    let owner = common::create_user(&state, Role::Buyer, "x").await?;
    let stranger = common::create_user(&state, Role::Buyer, "x").await?;
    let gas = common::create_service(&state, &manager, "Gas", "4").await?;
    let heat = common::create_service(&state, &manager, "Heating", "5").await?;

    let draft = request_service::add_to_draft(&state, &owner, gas, dec("2")).await?.data.unwrap();
    request_service::add_to_draft(&state, &owner, heat, dec("1")).await?;
    let id = draft.request.id;

    let qty = || UpdateLineRequest { quantity: Some(dec("3")), tariff_override: None };
    for err in [
        request_service::update_line(&state, &stranger, id, gas, qty()).await.unwrap_err(),
        request_service::remove_line(&state, &stranger, id, gas).await.unwrap_err(),
    ] {
        assert!(matches!(err, AppError::Forbidden), "{err:?}");
    }

    let line = request_service::update_line(&state, &manager, id, gas, qty()).await?.data.unwrap();
    assert_eq!(line.total, dec("12"));
    let after = request_service::remove_line(&state, &manager, id, heat).await?.data.unwrap();
    assert_eq!(after.total_cost, dec("12"));
    Ok(())
}

#[tokio::test]
async fn date_filter_uses_created_for_drafts_and_formed_for_the_rest() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else { return Ok(()) };
    let dir = tempfile::tempdir()?;
    let state = common::setup_state(&url, dir.path()).await?;
    let manager = common::create_user(&state, Role::Manager, "x").await?;
    let buyer = common::create_user(&state, Role::Buyer, "x").await?;
    let service = common::create_service(&state, &manager, "Electricity", "1").await?;

    let formed = request_service::add_to_draft(&state, &buyer, service, dec("1")).await?.data.unwrap().request.id;
    request_service::form_request(&state, &buyer, formed).await?;
    let draft = request_service::add_to_draft(&state, &buyer, service, dec("1")).await?.data.unwrap().request.id;
    assert_ne!(formed, draft);

    let created = DateTime::parse_from_rfc3339("2020-01-10T12:00:00+00:00")?;
    let formed_on = DateTime::parse_from_rfc3339("2021-06-01T08:30:00+00:00")?;
    Requests::update_many()
        .col_expr(requests::Column::CreatedAt, Expr::value(created))
        .filter(requests::Column::Id.is_in([formed, draft]))
        .exec(&state.orm)
        .await?;
    Requests::update_many()
        .col_expr(requests::Column::FormedAt, Expr::value(Some(formed_on)))
        .filter(requests::Column::Id.eq(formed))
        .exec(&state.orm)
        .await?;

    let on_day = |day: NaiveDate| RequestListQuery {
        date_from: Some(day),
        date_to: Some(day),
        per_page: Some(100),
        ..Default::default()
    };

    let created_day = NaiveDate::from_ymd_opt(2020, 1, 10).unwrap();
    let listed = request_service::list_requests(&state, &buyer, on_day(created_day)).await?.data.unwrap();
    let ids: Vec<_> = listed.items.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![draft]);

    let formed_day = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
    let listed = request_service::list_requests(&state, &buyer, on_day(formed_day)).await?.data.unwrap();
    let ids: Vec<_> = listed.items.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![formed]);
    Ok(())
}
