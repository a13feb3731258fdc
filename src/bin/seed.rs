use rust_decimal::Decimal;
use utility_billing_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    entity::Role,
    password::hash_password,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let admin_id = ensure_user(&pool, "admin", "admin123", Role::Admin).await?;
    let manager_id = ensure_user(&pool, "manager", "manager123", Role::Manager).await?;
    let buyer_id = ensure_user(&pool, "buyer", "buyer123", Role::Buyer).await?;
    seed_services(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, Manager ID: {manager_id}, Buyer ID: {buyer_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    login: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, login, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (login) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(login)
    .bind(password_hash)
    .bind(role.label())
    .fetch_one(pool)
    .await?;

    println!("Ensured user {login} (role={})", role.label());
    Ok(user_id)
}

async fn seed_services(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let services = [
        ("Electricity", "Metered household electricity", "kWh", "3.60"),
        ("Cold water", "Cold water supply", "m3", "42.30"),
        ("Hot water", "Hot water supply", "m3", "198.50"),
        ("Heating", "Central heating", "Gcal", "2450.00"),
        ("Gas", "Natural gas supply", "m3", "7.15"),
        ("Waste removal", "Municipal solid waste collection", "person", "120.00"),
    ];

    for (title, description, unit, tariff) in services {
        let tariff: Decimal = tariff.parse()?;
        sqlx::query(
            r#"
            INSERT INTO services (id, title, description, unit, tariff)
            SELECT $1, $2, $3, $4, $5
            WHERE NOT EXISTS (
                SELECT 1 FROM services WHERE title = $2 AND deleted_at IS NULL
            )
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(description)
        .bind(unit)
        .bind(tariff)
        .execute(pool)
        .await?;
    }

    println!("Seeded services");
    Ok(())
}
