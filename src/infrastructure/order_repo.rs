use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::order::{page_offset, ListResult, NewOrder, Order, OrderStatus};
use crate::domain::ports::OrderRepository;
use crate::domain::session::StoredSession;
use crate::schema::{order_items, orders};

use super::models::{NewOrderItemRow, NewOrderRow, OrderItemRow, OrderRow};
use super::session_repo::DieselSessionRepository;

pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn load_order(conn: &mut PgConnection, id: Uuid) -> Result<Option<Order>, DomainError> {
        let order = orders::table
            .find(id)
            .select(OrderRow::as_select())
            .first(conn)
            .optional()?;

        let Some(order) = order else {
            return Ok(None);
        };

        let items = OrderItemRow::belonging_to(&order)
            .select(OrderItemRow::as_select())
            .load(conn)?;

        order.into_order(items).map(Some)
    }
}

impl OrderRepository for DieselOrderRepository {
    fn create(&self, order: NewOrder, session: &StoredSession) -> Result<Order, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            // 1. Insert the order
            let order_id = Uuid::new_v4();
            let shipping = order.shipping;
            diesel::insert_into(orders::table)
                .values(&NewOrderRow {
                    id: order_id,
                    owner_id: order.owner_id,
                    first_name: shipping.first_name,
                    last_name: shipping.last_name,
                    email: shipping.email,
                    address: shipping.address,
                    postal_code: shipping.postal_code,
                    city: shipping.city,
                    country: shipping.country,
                    status: OrderStatus::Pending.as_str().to_string(),
                    total_amount: order.total_amount,
                })
                .execute(conn)?;

            // 2. Insert its items; any failure rolls back the order row too
            let new_items: Vec<NewOrderItemRow> = order
                .items
                .into_iter()
                .map(|i| NewOrderItemRow {
                    id: Uuid::new_v4(),
                    order_id,
                    product_id: i.product_id,
                    price: i.price,
                    quantity: i.quantity,
                })
                .collect();
            diesel::insert_into(order_items::table)
                .values(&new_items)
                .execute(conn)?;

            // 3. Persist the emptied cart; the order only exists if this commits
            DieselSessionRepository::upsert(conn, session)?;

            Self::load_order(conn, order_id)?
                .ok_or_else(|| DomainError::Internal(format!("order {order_id} vanished")))
        })
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        let mut conn = self.pool.get()?;
        Self::load_order(&mut conn, id)
    }

    fn list_for_owner(
        &self,
        owner_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<ListResult, DomainError> {
        let mut conn = self.pool.get()?;

        let offset = page_offset(page, limit)?;
        conn.transaction::<_, DomainError, _>(|conn| {
            let total: i64 = orders::table
                .filter(orders::owner_id.eq(owner_id))
                .count()
                .get_result(conn)?;

            let rows = orders::table
                .filter(orders::owner_id.eq(owner_id))
                .select(OrderRow::as_select())
                .order(orders::created_at.desc())
                .then_order_by(orders::id)
                .limit(limit)
                .offset(offset)
                .load(conn)?;

            let item_rows: Vec<OrderItemRow> = OrderItemRow::belonging_to(&rows)
                .select(OrderItemRow::as_select())
                .load(conn)?;
            let items = item_rows.grouped_by(&rows);

            let orders = rows
                .into_iter()
                .zip(items)
                .map(|(order, items)| order.into_order(items))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(ListResult {
                items: orders,
                total,
            })
        })
    }

    fn set_payment_session(&self, id: Uuid, session_id: &str) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        let updated = diesel::update(orders::table.find(id))
            .set((
                orders::payment_session_id.eq(session_id),
                orders::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        match updated {
            0 => Err(DomainError::NotFound),
            _ => Ok(()),
        }
    }

    fn mark_paid(&self, id: Uuid) -> Result<Order, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let updated = diesel::update(orders::table.find(id))
                .set((
                    orders::status.eq(OrderStatus::Paid.as_str()),
                    orders::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;
            if updated == 0 {
                return Err(DomainError::NotFound);
            }
            Self::load_order(conn, id)?.ok_or(DomainError::NotFound)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bigdecimal::BigDecimal;
    use chrono::{Duration, Utc};
    use diesel::prelude::*;
    use serde_json::json;
    use uuid::Uuid;

    use super::DieselOrderRepository;
    use crate::db::DbPool;
    use crate::domain::errors::DomainError;
    use crate::domain::order::{sample_shipping, NewOrder, NewOrderItem, OrderStatus};
    use crate::domain::ports::{OrderRepository, SessionRepository, SessionStore};
    use crate::domain::session::{SessionData, StoredSession};
    use crate::infrastructure::models::NewProductRow;
    use crate::infrastructure::session_repo::DieselSessionRepository;
    use crate::infrastructure::test_db::setup_db;
    use crate::schema::{order_items, orders, products};

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).expect("valid decimal")
    }

    fn seed_product(pool: &DbPool, price: &str) -> Uuid {
        let mut conn = pool.get().expect("Failed to get connection");
        let id = Uuid::new_v4();
        diesel::insert_into(products::table)
            .values(&NewProductRow {
                id,
                name: "Chore coat".to_string(),
                price: dec(price),
            })
            .execute(&mut conn)
            .expect("insert product");
        id
    }

    fn new_order(owner_id: Uuid, items: Vec<(Uuid, &str, i32)>) -> NewOrder {
        let items: Vec<NewOrderItem> = items
            .into_iter()
            .map(|(product_id, price, quantity)| NewOrderItem {
                product_id,
                price: dec(price),
                quantity,
            })
            .collect();
        let total_amount = items.iter().map(|i| &i.price * &BigDecimal::from(i.quantity)).sum();
        NewOrder {
            owner_id,
            shipping: sample_shipping(),
            total_amount,
            items,
        }
    }

    fn emptied_session() -> StoredSession {
        let mut data = SessionData::default();
        data.mark_dirty();
        StoredSession {
            id: Uuid::new_v4(),
            data,
            expires_at: Utc::now() + Duration::days(14),
        }
    }

    #[tokio::test]
    #[ignore = "requires docker (testcontainers postgres)"]
    async fn create_and_find_by_id_roundtrip() {
        let (_container, pool) = setup_db().await;
        let a = seed_product(&pool, "10.00");
        let b = seed_product(&pool, "5.00");
        let repo = DieselOrderRepository::new(pool.clone());
        let sessions = DieselSessionRepository::new(pool);
        let owner_id = Uuid::new_v4();
        let session = emptied_session();

        let created = repo
            .create(
                new_order(owner_id, vec![(a, "10.00", 2), (b, "5.00", 1)]),
                &session,
            )
            .expect("create failed");

        let stored = sessions
            .load(session.id)
            .expect("load session")
            .expect("session written with the order");
        assert_eq!(stored.get("cart"), None);

        let order = repo
            .find_by_id(created.id)
            .expect("find failed")
            .expect("order should exist");

        assert_eq!(order.owner_id, owner_id);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, dec("25.00"));
        assert_eq!(order.payment_session_id, "");
        assert_eq!(order.shipping, sample_shipping());
        assert_eq!(order.items.len(), 2);
    }

    #[tokio::test]
    #[ignore = "requires docker (testcontainers postgres)"]
    async fn failed_item_insert_rolls_back_the_order() {
        let (_container, pool) = setup_db().await;
        let a = seed_product(&pool, "10.00");
        let repo = DieselOrderRepository::new(pool.clone());
        let sessions = DieselSessionRepository::new(pool.clone());

        // The visitor's cart as it was before checkout.
        let session_id = Uuid::new_v4();
        let mut before = SessionData::default();
        before.set("cart", json!([{"product_id": a, "quantity": 1, "unit_price": "10.00"}]));
        sessions
            .save(session_id, &before, Utc::now() + Duration::days(1))
            .expect("save");

        // The second item references a product that does not exist.
        let result = repo.create(
            new_order(
                Uuid::new_v4(),
                vec![(a, "10.00", 1), (Uuid::new_v4(), "1.00", 1)],
            ),
            &StoredSession {
                id: session_id,
                ..emptied_session()
            },
        );

        assert!(matches!(result, Err(DomainError::Internal(_))));
        let mut conn = pool.get().expect("Failed to get connection");
        let order_count: i64 = orders::table.count().get_result(&mut conn).expect("count");
        let item_count: i64 = order_items::table
            .count()
            .get_result(&mut conn)
            .expect("count");
        assert_eq!(order_count, 0);
        assert_eq!(item_count, 0);
        let kept = sessions.load(session_id).expect("load").expect("session");
        assert!(kept.get("cart").is_some());
    }

    #[tokio::test]
    #[ignore = "requires docker (testcontainers postgres)"]
    async fn find_by_id_returns_none_for_unknown_id() {
        let (_container, pool) = setup_db().await;
        let repo = DieselOrderRepository::new(pool);

        let result = repo
            .find_by_id(Uuid::new_v4())
            .expect("find should not error");

        assert!(result.is_none());
    }

    #[tokio::test]
    #[ignore = "requires docker (testcontainers postgres)"]
    async fn payment_session_and_paid_status_are_persisted() {
        let (_container, pool) = setup_db().await;
        let a = seed_product(&pool, "4.50");
        let repo = DieselOrderRepository::new(pool);
        let order = repo
            .create(new_order(Uuid::new_v4(), vec![(a, "4.50", 2)]), &emptied_session())
            .expect("create failed");

        repo.set_payment_session(order.id, "cs_test_123")
            .expect("set session");
        let paid = repo.mark_paid(order.id).expect("mark paid");

        assert_eq!(paid.status, OrderStatus::Paid);
        assert_eq!(paid.payment_session_id, "cs_test_123");
        assert_eq!(paid.total_amount, dec("9.00"));
        assert!(paid.updated_at >= order.updated_at);
    }

    #[tokio::test]
    #[ignore = "requires docker (testcontainers postgres)"]
    async fn updates_on_unknown_order_are_not_found() {
        let (_container, pool) = setup_db().await;
        let repo = DieselOrderRepository::new(pool);

        assert!(matches!(
            repo.set_payment_session(Uuid::new_v4(), "cs_x"),
            Err(DomainError::NotFound)
        ));
        assert!(matches!(
            repo.mark_paid(Uuid::new_v4()),
            Err(DomainError::NotFound)
        ));
    }

    #[tokio::test]
    #[ignore = "requires docker (testcontainers postgres)"]
    async fn list_for_owner_paginates_and_filters() {
        let (_container, pool) = setup_db().await;
        let a = seed_product(&pool, "1.00");
        let repo = DieselOrderRepository::new(pool);
        let owner_id = Uuid::new_v4();

        let session = emptied_session();
        for _ in 0..5 {
            repo.create(new_order(owner_id, vec![(a, "1.00", 1)]), &session)
                .expect("create failed");
        }
        repo.create(new_order(Uuid::new_v4(), vec![(a, "1.00", 1)]), &session)
            .expect("create failed");

        let page1 = repo.list_for_owner(owner_id, 1, 3).expect("list page 1 failed");
        assert_eq!(page1.total, 5);
        assert_eq!(page1.items.len(), 3);
        assert!(page1.items.iter().all(|o| o.items.len() == 1));

        let page2 = repo.list_for_owner(owner_id, 2, 3).expect("list page 2 failed");
        assert_eq!(page2.total, 5);
        assert_eq!(page2.items.len(), 2);

        let mut seen: Vec<Uuid> = page1.items.iter().chain(&page2.items).map(|o| o.id).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 5);

        assert!(matches!(
            repo.list_for_owner(owner_id, i64::MAX, 3),
            Err(DomainError::Validation(_))
        ));
    }
}
