use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum_restaurant_api::{config::AppConfig, db::create_pool};
use rust_decimal::Decimal;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    ensure_user(&pool, "admin@example.com", "admin123", "ADMIN").await?;
    ensure_user(&pool, "manager@example.com", "manager123", "MANAGER").await?;
    ensure_user(&pool, "waiter@example.com", "waiter123", "WAITER").await?;
    ensure_user(&pool, "customer@example.com", "customer123", "CUSTOMER").await?;
    seed_menu(&pool).await?;
    seed_tables(&pool).await?;

    println!("Seed completed.");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_menu(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let categories = ["Appetizers", "Main Courses", "Drinks"];
    for name in categories {
        sqlx::query("INSERT INTO categories (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(pool)
            .await?;
    }

    let dishes = [
        ("Spring Rolls", "Appetizers", Decimal::new(4500000, 2)),
        ("Grilled Pork Noodles", "Main Courses", Decimal::new(6500000, 2)),
        ("Beef Pho", "Main Courses", Decimal::new(7000000, 2)),
        ("Iced Coffee", "Drinks", Decimal::new(3000000, 2)),
    ];
    for (name, category, price) in dishes {
        sqlx::query(
            r#"
            INSERT INTO dishes (name, price, category_id)
            SELECT $1, $2, id FROM categories WHERE name = $3
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(name)
        .bind(price)
        .bind(category)
        .execute(pool)
        .await?;
    }

    println!("Seeded menu");
    Ok(())
}

async fn seed_tables(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let tables = [("T1", 2), ("T2", 4), ("T3", 4), ("T4", 6), ("T5", 8)];
    for (number, capacity) in tables {
        sqlx::query(
            "INSERT INTO tables (table_number, capacity) VALUES ($1, $2) ON CONFLICT (table_number) DO NOTHING",
        )
        .bind(number)
        .bind(capacity)
        .execute(pool)
        .await?;
    }

    println!("Seeded tables");
    Ok(())
}
