#![allow(dead_code)]

use bus_ticketing::api;
use constcat::concat;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:3000";

pub const ALICE: &str = "alice@example.com";
pub const BOB: &str = "bob@example.com";
pub const CAROL: &str = "carol@example.com";
pub const PASSWORD: &str = "password";

/// Price of every seat on bus 1 in the seed data.
pub const BUS_1_SEAT_PRICE: i64 = 150_000;

pub struct Client {
    inner: reqwest::Client,
    pub auth_token: Option<String>,
}

impl Client {
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::new(),
            auth_token: None,
        }
    }

    pub async fn auth(mut self, email: &str, password: &str) -> Self {
        self.auth_token = Some(
            self.try_auth(email, password)
                .await
                .expect("wrong status code"),
        );
        self
    }

    pub async fn try_auth(
        &self,
        email: &str,
        password: &str,
    ) -> Result<String, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/auth");

        Ok(self
            .inner
            .post(URL)
            .json(&json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .text()
            .await
            .expect("failed to get a response"))
    }

    fn authorized(&self, mut req: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        req
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<T, StatusCode> {
        Ok(self
            .authorized(req)
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .json::<T>()
            .await
            .expect("failed to get a response"))
    }

    pub async fn user(&self) -> Result<api::User, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/user");

        self.send(self.inner.get(URL)).await
    }

    pub async fn routes(
        &self,
    ) -> Result<Vec<api::schedule::Route>, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets/routes");

        self.send(self.inner.get(URL)).await
    }

    pub async fn route_schedules(
        &self,
        route_id: &str,
    ) -> Result<Vec<api::schedule::Departure>, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets/routes");

        self.send(self.inner.get(format!("{URL}/{route_id}/schedules")))
            .await
    }

    pub async fn available_seats(
        &self,
        bus_id: &str,
    ) -> Result<Vec<api::seat::Seat>, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets/buses");

        self.send(self.inner.get(format!("{URL}/{bus_id}/seats"))).await
    }

    pub async fn seat_is_offered(&self, bus_id: i32, seat_id: i32) -> bool {
        self.available_seats(&bus_id.to_string())
            .await
            .expect("failed to list seats")
            .iter()
            .any(|s| s.id == api::seat::Id::from(seat_id))
    }

    pub async fn book(
        &self,
        schedule_id: i32,
        seat_id: i32,
        payment_method: &str,
    ) -> Result<api::Ticket, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets/booking");

        self.send(self.inner.post(URL).json(&json!({
            "schedule_id": schedule_id,
            "seat_id": seat_id,
            "payment_method": payment_method,
        })))
        .await
    }

    /// Books without naming a payment method.
    pub async fn book_default(
        &self,
        schedule_id: i32,
        seat_id: i32,
    ) -> Result<api::Ticket, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets/booking");

        self.send(self.inner.post(URL).json(&json!({
            "schedule_id": schedule_id,
            "seat_id": seat_id,
        })))
        .await
    }

    pub async fn cancel(
        &self,
        id: api::ticket::Id,
        reason: &str,
    ) -> Result<api::Ticket, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets/cancel");

        self.send(
            self.inner
                .put(format!("{URL}/{id}"))
                .json(&json!({ "reason": reason })),
        )
        .await
    }

    pub async fn restore(
        &self,
        id: api::ticket::Id,
        reason: &str,
    ) -> Result<api::Ticket, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets/cancel_ticket/delete");

        self.send(
            self.inner
                .put(format!("{URL}/{id}"))
                .json(&json!({ "reason": reason })),
        )
        .await
    }

    pub async fn webhook(
        &self,
        payload: Value,
    ) -> Result<api::payment::Payment, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets/payment/sepay/webhook");

        self.send(self.inner.post(URL).json(&payload)).await
    }

    /// Gateway notification paying `amount` for ticket `id`.
    pub async fn pay(
        &self,
        id: api::ticket::Id,
        amount: i64,
    ) -> Result<api::payment::Payment, StatusCode> {
        self.webhook(json!({
            "id": 92704,
            "gateway": "Vietcombank",
            "transactionDate": "2025-10-01 10:00:00",
            "accountNumber": "0123499999",
            "content": format!("DH {id} thanh toan ve xe"),
            "description": format!("BankAPINotify DH {id}"),
            "transferType": "in",
            "transferAmount": amount,
            "accumulated": 19077000,
            "referenceCode": format!("MBVCB.{id}"),
        }))
        .await
    }

    pub async fn confirm_cash(
        &self,
        id: api::ticket::Id,
    ) -> Result<api::payment::Payment, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets/payment/cash");

        self.send(self.inner.put(format!("{URL}/{id}"))).await
    }

    pub async fn payment_status(
        &self,
        id: &str,
    ) -> Result<api::ticket::PaymentStatus, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets/payment/status");

        self.send(self.inner.get(format!("{URL}/{id}"))).await
    }

    pub async fn ticket(
        &self,
        id: api::ticket::Id,
    ) -> Result<api::ticket::Details, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets");

        self.send(self.inner.get(format!("{URL}/{id}"))).await
    }

    pub async fn history(
        &self,
        page: usize,
        limit: usize,
    ) -> Result<api::ticket::List, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets/history");

        self.send(self.inner.get(format!("{URL}?page={page}&limit={limit}")))
            .await
    }

    pub async fn tickets_by_status(
        &self,
        status: &str,
    ) -> Result<Vec<api::Ticket>, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets/history_status");

        self.send(self.inner.get(format!("{URL}/{status}"))).await
    }

    /// Guest lookup; pairs left out are not sent at all.
    pub async fn search_ticket(
        &self,
        ticket_id: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<api::ticket::Details, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets/search");

        let mut query = Vec::new();
        if let Some(ticket_id) = ticket_id {
            query.push(("ticketId", ticket_id));
        }
        if let Some(phone_number) = phone_number {
            query.push(("phoneNumber", phone_number));
        }
        self.send(self.inner.get(URL).query(&query)).await
    }

    pub async fn my_tickets(
        &self,
    ) -> Result<Vec<api::ticket::Details>, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets/user/me");

        self.send(self.inner.get(URL)).await
    }

    pub async fn chat(
        &self,
        message: &str,
        user_id: Option<i32>,
    ) -> Result<api::chatbot::Reply, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/chatbot/message");

        self.send(self.inner.post(URL).json(&json!({
            "message": message,
            "userId": user_id,
        })))
        .await
    }

    pub async fn clear_conversation(
        &self,
        user_id: &str,
    ) -> Result<(), StatusCode> {
        const URL: &str = concat!(BASE_URL, "/chatbot/conversation-state");

        self.authorized(self.inner.delete(format!("{URL}/{user_id}")))
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?;
        Ok(())
    }

    /// Sends `body` verbatim as JSON to `path` and returns the failure it
    /// provokes.
    pub async fn post_raw(
        &self,
        path: &str,
        body: &str,
    ) -> (StatusCode, api::Failure) {
        let req = self
            .inner
            .post(format!("{BASE_URL}{path}"))
            .header("Content-Type", "application/json")
            .body(body.to_owned());
        self.failure(req).await
    }

    /// Issues a GET to `path` and returns the failure it provokes.
    pub async fn get_raw(&self, path: &str) -> (StatusCode, api::Failure) {
        self.failure(self.inner.get(format!("{BASE_URL}{path}"))).await
    }

    async fn failure(&self, req: RequestBuilder) -> (StatusCode, api::Failure) {
        let response = self
            .authorized(req)
            .send()
            .await
            .expect("failed to send a request");
        let status = response.status();
        let body = response
            .json::<api::Failure>()
            .await
            .expect("failure body is not JSON");
        (status, body)
    }
}
