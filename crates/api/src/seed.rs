//! Demo data for running the server without a database.

use common::{Money, Principal, ProductId, Role, UserId};
use order_store::{InMemoryOrderStore, ProductRecord, UserRecord};

use crate::auth::StaticTokenProvider;

/// Token accepted for the demo administrator when no token table is configured.
pub const DEMO_ADMIN_TOKEN: &str = "demo-admin";
/// Token accepted for the demo client when no token table is configured.
pub const DEMO_CLIENT_TOKEN: &str = "demo-client";

/// Seeds users and catalog products into an in-memory store.
pub async fn seed_demo_data(store: &InMemoryOrderStore) {
    let users = [
        (1, "admin", "admin@example.com", Role::Admin),
        (7, "lan", "lan@example.com", Role::Client),
    ];
    for (id, username, email, role) in users {
        store
            .insert_user(UserRecord {
                user_id: UserId::new(id),
                username: username.to_string(),
                email: Some(email.to_string()),
                role,
            })
            .await;
    }

    let products = [
        (1, "Linen shirt", 100, 25, "shirt", Some("/img/linen-shirt.jpg")),
        (2, "Canvas tote", 50, 40, "bag", Some("/img/canvas-tote.jpg")),
        (3, "Wool scarf", 75, 10, "accessory", None),
    ];
    for (id, name, price, stock, category, url) in products {
        store
            .insert_product(ProductRecord {
                product_id: ProductId::new(id),
                name: name.to_string(),
                price: Money::from_units(price),
                stock_quantity: stock,
                category: category.to_string(),
                url: url.map(str::to_string),
            })
            .await;
    }
}

/// Token table matching the seeded users.
pub fn demo_tokens() -> StaticTokenProvider {
    StaticTokenProvider::new()
        .with_token(DEMO_ADMIN_TOKEN, Principal::admin(UserId::new(1)))
        .with_token(DEMO_CLIENT_TOKEN, Principal::client(UserId::new(7)))
}
