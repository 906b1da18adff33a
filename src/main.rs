use std::{error::Error, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, State,
    },
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        request, HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, RequestPartsExt as _, Router,
};
use axum_extra::TypedHeader;
use derive_more::From;
use headers::{authorization::Bearer, Authorization};
use jsonwebtoken::{
    decode, encode, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::{fs, net, task};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use bus_ticketing::{
    api,
    assistant::Assistant,
    db::{self, payment::Receipt},
    embedding, llm, Config,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = fs::read_to_string("config.toml").await?;
    let config = toml::from_str::<Config>(&config)?;

    let (db_client, db_connection) = db::connect(config.db).await?;

    task::spawn(async move {
        if let Err(e) = db_connection.await {
            panic!("database connection failed: {e}");
        }
    });

    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);
    for origin in &config.http.cors.allowed_origins {
        cors = cors.allow_origin(origin.parse::<HeaderValue>()?);
    }

    let assistant = Assistant::new(
        embedding::Client::new(config.embedding),
        llm::Client::new(config.llm),
    );

    let app = Router::new()
        .route("/auth", post(auth))
        .route("/user", get(get_user))
        .route("/tickets/routes", get(list_routes))
        .route("/tickets/routes/:id/schedules", get(list_route_schedules))
        .route("/tickets/buses/:id/seats", get(list_available_seats))
        .route("/tickets/booking", post(book_ticket))
        .route("/tickets/cancel/:id", put(cancel_ticket))
        .route("/tickets/cancel_ticket/delete/:id", put(restore_ticket))
        .route("/tickets/payment/sepay/webhook", post(confirm_payment_webhook))
        .route("/tickets/payment/cash/:id", put(confirm_cash_payment))
        .route("/tickets/payment/status/:id", get(check_payment_status))
        .route("/tickets/history", get(list_ticket_history))
        .route("/tickets/history_status/:status", get(list_tickets_by_status))
        .route("/tickets/user/me", get(list_my_tickets))
        .route("/tickets/search", get(search_ticket))
        .route("/tickets/:id", get(get_ticket))
        .route("/chatbot/message", post(chatbot_message))
        .route(
            "/chatbot/conversation-state/:user_id",
            delete(clear_conversation_state),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(AppState {
            db_client,
            assistant,
            jwt_expiration_time: config.jwt.expiration_time,
            jwt_decoding_key: DecodingKey::from_secret(
                config.jwt.secret.as_bytes(),
            ),
            jwt_encoding_key: EncodingKey::from_secret(
                config.jwt.secret.as_bytes(),
            ),
        }));

    let listener = net::TcpListener::bind(config.http.server.addr).await?;
    tracing::info!("listening on {}", config.http.server.addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Renders a failure as `{"success": false, "message": ...}`.
fn failure(status: StatusCode, message: &str) -> Response {
    (status, Json(api::Failure::new(message))).into_response()
}

fn internal_error(e: &db::Error) -> Response {
    tracing::error!("database request failed: {e}");
    failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// JSON request body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(Rejection))]
struct Body<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(Rejection))]
struct PathParam<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(Rejection))]
struct QueryParams<T>(T);

/// Malformed request, rendered like every other failure.
#[derive(Debug, From)]
pub enum Rejection {
    Json(JsonRejection),
    Path(PathRejection),
    Query(QueryRejection),
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Json(r) => (r.status(), r.body_text()),
            Self::Path(r) => (r.status(), r.body_text()),
            Self::Query(r) => (r.status(), r.body_text()),
        };
        failure(status, &message)
    }
}

#[derive(Deserialize)]
struct AuthInput {
    email: String,
    password: String,
}

async fn auth(
    State(state): State<SharedAppState>,
    Body(AuthInput { email, password }): Body<AuthInput>,
) -> Result<String, AuthError> {
    use AuthError as E;

    let password_hash = api::user::PasswordHash::new(&password);

    let user = state
        .db_client
        .get_user_by_email(&email)
        .await?
        .filter(|u| u.password_hash == password_hash)
        .ok_or(E::WrongEmailOrPassword)?;

    let expires_at = OffsetDateTime::now_utc() + state.jwt_expiration_time;
    encode(
        &Header::default(),
        &AuthClaims {
            user_id: user.id,
            exp: expires_at.unix_timestamp(),
        },
        &state.jwt_encoding_key,
    )
    .map_err(|_| E::InvalidToken)
}

#[derive(Debug, From)]
pub enum AuthError {
    #[from]
    DbError(db::Error),
    InvalidToken,
    WrongEmailOrPassword,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => internal_error(&e),
            Self::InvalidToken => {
                failure(StatusCode::UNAUTHORIZED, "Missing or invalid token")
            }
            Self::WrongEmailOrPassword => {
                failure(StatusCode::FORBIDDEN, "Wrong email or password")
            }
        }
    }
}

async fn get_user(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<api::User>, GetUserError> {
    use GetUserError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;

    Ok(Json(my.into()))
}

#[derive(Debug, From)]
pub enum GetUserError {
    #[from]
    DbError(db::Error),
    UserNotFound,
}

impl IntoResponse for GetUserError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => internal_error(&e),
            Self::UserNotFound => {
                failure(StatusCode::UNAUTHORIZED, "User not found")
            }
        }
    }
}

async fn list_routes(
    State(state): State<SharedAppState>,
) -> Result<Json<Vec<api::schedule::Route>>, ListRoutesError> {
    Ok(Json(state.db_client.get_routes().await?))
}

#[derive(Debug, From)]
pub enum ListRoutesError {
    #[from]
    DbError(db::Error),
}

impl IntoResponse for ListRoutesError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => internal_error(&e),
        }
    }
}

async fn list_route_schedules(
    State(state): State<SharedAppState>,
    PathParam(route_id): PathParam<db::route::Id>,
) -> Result<Json<Vec<api::schedule::Departure>>, ListRouteSchedulesError> {
    let departures = state.db_client.get_upcoming_departures(route_id).await?;
    Ok(Json(departures.into_iter().map(Into::into).collect()))
}

#[derive(Debug, From)]
pub enum ListRouteSchedulesError {
    #[from]
    DbError(db::Error),
}

impl IntoResponse for ListRouteSchedulesError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => internal_error(&e),
        }
    }
}

async fn list_available_seats(
    State(state): State<SharedAppState>,
    PathParam(bus_id): PathParam<db::bus::Id>,
) -> Result<Json<Vec<api::seat::Seat>>, ListAvailableSeatsError> {
    let seats = state.db_client.get_available_seats(bus_id).await?;
    Ok(Json(seats.into_iter().map(Into::into).collect()))
}

#[derive(Debug, From)]
pub enum ListAvailableSeatsError {
    #[from]
    DbError(db::Error),
}

impl IntoResponse for ListAvailableSeatsError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => internal_error(&e),
        }
    }
}

async fn book_ticket(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Body(api::ticket::BookInput {
        schedule_id,
        seat_id,
        payment_method,
    }): Body<api::ticket::BookInput>,
) -> Result<Json<api::Ticket>, BookTicketError> {
    use BookTicketError as E;

    let db_client = &state.db_client;

    let schedule = db_client
        .get_schedule_by_id(schedule_id)
        .await?
        .ok_or(E::ScheduleNotFound)?;
    db_client
        .get_seat_by_id(seat_id)
        .await?
        .filter(|seat| {
            seat.bus_id == schedule.bus_id
                && seat.status == db::seat::Status::Available
        })
        .ok_or(E::SeatUnavailable)?;
    if db_client.has_booked_ticket(seat_id, schedule_id).await? {
        return Err(E::DuplicateBooking);
    }

    let new = db::ticket::NewTicket {
        user_id: auth_claims.user_id,
        seat_id,
        schedule_id,
        payment_method,
    };
    let Some(ticket) = db_client.insert_pending_ticket(new).await? else {
        // Lost a race after the checks above; report what changed.
        let seat = db_client.get_seat_by_id(seat_id).await?;
        return Err(
            if seat.is_some_and(|s| s.status == db::seat::Status::Available) {
                E::DuplicateBooking
            } else {
                E::SeatUnavailable
            },
        );
    };

    tracing::info!(
        ticket_id = %ticket.id,
        user_id = %ticket.user_id,
        seat_id = %seat_id,
        schedule_id = %schedule_id,
        payment_method = %payment_method,
        "ticket booked",
    );

    Ok(Json(ticket.into()))
}

#[derive(Debug, From)]
pub enum BookTicketError {
    #[from]
    DbError(db::Error),
    DuplicateBooking,
    ScheduleNotFound,
    SeatUnavailable,
}

impl IntoResponse for BookTicketError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => internal_error(&e),
            Self::DuplicateBooking => failure(
                StatusCode::BAD_REQUEST,
                "Seat is already booked for this schedule",
            ),
            Self::ScheduleNotFound => {
                failure(StatusCode::NOT_FOUND, "Schedule not found")
            }
            Self::SeatUnavailable => {
                failure(StatusCode::BAD_REQUEST, "Seat is not available")
            }
        }
    }
}

async fn confirm_payment_webhook(
    State(state): State<SharedAppState>,
    Body(webhook): Body<api::payment::Webhook>,
) -> Result<Json<api::payment::Payment>, ConfirmPaymentWebhookError> {
    use ConfirmPaymentWebhookError as E;

    let db_client = &state.db_client;

    let result: Result<db::Payment, E> = async {
        let ticket_id = webhook.ticket_id().ok_or(E::TicketIdMissing)?;
        let amount = webhook.amount().ok_or(E::InvalidAmount)?;

        let ticket = db_client
            .get_ticket_by_id(ticket_id)
            .await?
            .ok_or(E::TicketNotFound)?;
        db_client
            .get_schedule_by_id(ticket.schedule_id)
            .await?
            .ok_or(E::ScheduleNotFound)?;
        if ticket.status == db::ticket::Status::Canceled {
            return Err(E::TicketCanceled);
        }
        if amount != ticket.total_price {
            return Err(E::AmountMismatch {
                expected: ticket.total_price,
                received: amount,
            });
        }

        let receipt = Receipt {
            method: db::payment::Method::Online,
            amount,
            reference: webhook.reference(),
            notes: Some(webhook.notes()),
        };
        confirm_payment(db_client, ticket.id, &receipt)
            .await?
            .ok_or(E::TicketCanceled)
    }
    .await;

    match result {
        Ok(payment) => {
            tracing::info!(
                ticket_id = %payment.ticket_id,
                amount = payment.amount,
                reference = ?payment.reference,
                "payment confirmed by gateway",
            );
            Ok(Json(payment.into()))
        }
        Err(e) => {
            if !matches!(e, E::DbError(_)) {
                tracing::warn!(
                    description = ?webhook.description,
                    content = ?webhook.content,
                    "payment webhook rejected: {e:?}",
                );
            }
            Err(e)
        }
    }
}

#[derive(Debug, From)]
pub enum ConfirmPaymentWebhookError {
    #[from]
    DbError(db::Error),
    AmountMismatch {
        expected: i64,
        received: i64,
    },
    DuplicateBooking,
    InvalidAmount,
    ScheduleNotFound,
    TicketCanceled,
    TicketIdMissing,
    TicketNotFound,
}

impl From<ConfirmError> for ConfirmPaymentWebhookError {
    fn from(e: ConfirmError) -> Self {
        match e {
            ConfirmError::DbError(e) => Self::DbError(e),
            ConfirmError::DuplicateBooking => Self::DuplicateBooking,
        }
    }
}

impl IntoResponse for ConfirmPaymentWebhookError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => internal_error(&e),
            Self::AmountMismatch { .. } => failure(
                StatusCode::BAD_REQUEST,
                "Transfer amount does not match ticket amount",
            ),
            Self::DuplicateBooking => failure(
                StatusCode::BAD_REQUEST,
                "Seat is already booked for this schedule",
            ),
            Self::InvalidAmount => {
                failure(StatusCode::BAD_REQUEST, "Invalid transfer amount")
            }
            Self::ScheduleNotFound => {
                failure(StatusCode::NOT_FOUND, "Schedule not found for ticket")
            }
            Self::TicketCanceled => {
                failure(StatusCode::BAD_REQUEST, "Ticket is canceled")
            }
            Self::TicketIdMissing => failure(
                StatusCode::BAD_REQUEST,
                "Cannot extract ticket id from description",
            ),
            Self::TicketNotFound => {
                failure(StatusCode::NOT_FOUND, "Ticket not found")
            }
        }
    }
}

async fn confirm_cash_payment(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    PathParam(id): PathParam<api::ticket::Id>,
) -> Result<Json<api::payment::Payment>, ConfirmCashPaymentError> {
    use ConfirmCashPaymentError as E;

    let db_client = &state.db_client;

    let my = db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;
    if !my.role.is_admin() {
        return Err(E::Forbidden);
    }

    let ticket = db_client
        .get_ticket_by_id(id)
        .await?
        .ok_or(E::TicketNotFound)?;
    if ticket.status != db::ticket::Status::Pending {
        return Err(E::TicketNotPending);
    }
    if ticket.payment_method != db::payment::Method::Cash {
        return Err(E::NotCashPayment);
    }

    let receipt = Receipt {
        method: db::payment::Method::Cash,
        amount: ticket.total_price,
        reference: None,
        notes: None,
    };
    let payment = confirm_payment(db_client, ticket.id, &receipt)
        .await?
        .ok_or(E::TicketNotPending)?;

    tracing::info!(
        ticket_id = %payment.ticket_id,
        admin_id = %my.id,
        amount = payment.amount,
        "cash payment confirmed",
    );

    Ok(Json(payment.into()))
}

#[derive(Debug, From)]
pub enum ConfirmCashPaymentError {
    #[from]
    DbError(db::Error),
    DuplicateBooking,
    Forbidden,
    NotCashPayment,
    TicketNotFound,
    TicketNotPending,
    UserNotFound,
}

impl From<ConfirmError> for ConfirmCashPaymentError {
    fn from(e: ConfirmError) -> Self {
        match e {
            ConfirmError::DbError(e) => Self::DbError(e),
            ConfirmError::DuplicateBooking => Self::DuplicateBooking,
        }
    }
}

impl IntoResponse for ConfirmCashPaymentError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => internal_error(&e),
            Self::DuplicateBooking => failure(
                StatusCode::BAD_REQUEST,
                "Seat is already booked for this schedule",
            ),
            Self::Forbidden => failure(
                StatusCode::FORBIDDEN,
                "Only administrators can confirm cash payments",
            ),
            Self::NotCashPayment => failure(
                StatusCode::BAD_REQUEST,
                "Ticket is not paid in cash",
            ),
            Self::TicketNotFound => {
                failure(StatusCode::NOT_FOUND, "Ticket not found")
            }
            Self::TicketNotPending => {
                failure(StatusCode::BAD_REQUEST, "Ticket is not pending")
            }
            Self::UserNotFound => {
                failure(StatusCode::UNAUTHORIZED, "User not found")
            }
        }
    }
}

#[derive(Debug, From)]
pub enum ConfirmError {
    #[from]
    DbError(db::Error),
    DuplicateBooking,
}

/// Books `ticket_id` as paid, telling apart a seat already taken by another
/// ticket from other database failures.
async fn confirm_payment(
    db_client: &db::Client,
    ticket_id: db::ticket::Id,
    receipt: &Receipt,
) -> Result<Option<db::Payment>, ConfirmError> {
    db_client
        .confirm_ticket_payment(ticket_id, receipt)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                ConfirmError::DuplicateBooking
            } else {
                ConfirmError::DbError(e)
            }
        })
}

async fn cancel_ticket(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    PathParam(id): PathParam<api::ticket::Id>,
    Body(api::ticket::ReasonInput { reason }): Body<api::ticket::ReasonInput>,
) -> Result<Json<api::Ticket>, CancelTicketError> {
    use CancelTicketError as E;

    let db_client = &state.db_client;

    let reason = reason.trim();
    if reason.is_empty() {
        return Err(E::ReasonMissing);
    }

    let my = db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;
    let ticket = db_client
        .get_ticket_by_id(id)
        .await?
        .ok_or(E::TicketNotFound)?;
    if ticket.status == db::ticket::Status::Canceled {
        return Err(E::AlreadyCanceled);
    }
    if !my.role.is_admin() && ticket.user_id != my.id {
        return Err(E::Forbidden);
    }

    let ticket = db_client
        .cancel_ticket(ticket.id, reason)
        .await?
        .ok_or(E::AlreadyCanceled)?;

    tracing::info!(
        ticket_id = %ticket.id,
        canceled_by = %my.id,
        reason,
        "ticket canceled",
    );

    Ok(Json(ticket.into()))
}

#[derive(Debug, From)]
pub enum CancelTicketError {
    #[from]
    DbError(db::Error),
    AlreadyCanceled,
    Forbidden,
    ReasonMissing,
    TicketNotFound,
    UserNotFound,
}

impl IntoResponse for CancelTicketError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => internal_error(&e),
            Self::AlreadyCanceled => {
                failure(StatusCode::BAD_REQUEST, "Ticket is already canceled")
            }
            Self::Forbidden => failure(
                StatusCode::FORBIDDEN,
                "You can only cancel your own tickets",
            ),
            Self::ReasonMissing => failure(
                StatusCode::BAD_REQUEST,
                "A cancellation reason is required",
            ),
            Self::TicketNotFound => {
                failure(StatusCode::NOT_FOUND, "Ticket not found")
            }
            Self::UserNotFound => {
                failure(StatusCode::UNAUTHORIZED, "User not found")
            }
        }
    }
}

async fn restore_ticket(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    PathParam(id): PathParam<api::ticket::Id>,
    Body(api::ticket::ReasonInput { reason }): Body<api::ticket::ReasonInput>,
) -> Result<Json<api::Ticket>, RestoreTicketError> {
    use RestoreTicketError as E;

    let db_client = &state.db_client;

    let my = db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;
    if !my.role.is_admin() {
        return Err(E::Forbidden);
    }

    let reason = reason.trim();
    if reason.is_empty() {
        return Err(E::ReasonMissing);
    }

    let ticket = db_client
        .get_ticket_by_id(id)
        .await?
        .ok_or(E::TicketNotFound)?;
    if ticket.status != db::ticket::Status::Canceled {
        return Err(E::TicketNotCanceled);
    }

    let ticket = match db_client.restore_ticket(ticket.id, reason).await {
        Ok(ticket) => ticket.ok_or(E::TicketNotCanceled)?,
        Err(e) if db::is_unique_violation(&e) => {
            return Err(E::DuplicateBooking)
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        ticket_id = %ticket.id,
        admin_id = %my.id,
        reason,
        "ticket restored",
    );

    Ok(Json(ticket.into()))
}

#[derive(Debug, From)]
pub enum RestoreTicketError {
    #[from]
    DbError(db::Error),
    DuplicateBooking,
    Forbidden,
    ReasonMissing,
    TicketNotCanceled,
    TicketNotFound,
    UserNotFound,
}

impl IntoResponse for RestoreTicketError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => internal_error(&e),
            Self::DuplicateBooking => failure(
                StatusCode::BAD_REQUEST,
                "Seat is already booked for this schedule",
            ),
            Self::Forbidden => failure(
                StatusCode::FORBIDDEN,
                "Only administrators can restore tickets",
            ),
            Self::ReasonMissing => failure(
                StatusCode::BAD_REQUEST,
                "A restoration reason is required",
            ),
            Self::TicketNotCanceled => {
                failure(StatusCode::BAD_REQUEST, "Ticket is not canceled")
            }
            Self::TicketNotFound => {
                failure(StatusCode::NOT_FOUND, "Ticket not found")
            }
            Self::UserNotFound => {
                failure(StatusCode::UNAUTHORIZED, "User not found")
            }
        }
    }
}

async fn check_payment_status(
    State(state): State<SharedAppState>,
    PathParam(id): PathParam<api::ticket::Id>,
) -> Result<Json<api::ticket::PaymentStatus>, CheckPaymentStatusError> {
    use CheckPaymentStatusError as E;

    let ticket_fut = state.db_client.get_ticket_by_id(id);
    let payment_fut = state.db_client.get_payment_by_ticket_id(id);
    let (ticket, payment) = tokio::try_join!(ticket_fut, payment_fut)?;
    let ticket = ticket.ok_or(E::TicketNotFound)?;

    let status = match payment {
        Some(p) if p.status == db::payment::Status::Booked => {
            db::ticket::Status::Booked
        }
        _ => ticket.status,
    };

    Ok(Json(api::ticket::PaymentStatus { status }))
}

#[derive(Debug, From)]
pub enum CheckPaymentStatusError {
    #[from]
    DbError(db::Error),
    TicketNotFound,
}

impl IntoResponse for CheckPaymentStatusError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => internal_error(&e),
            Self::TicketNotFound => {
                failure(StatusCode::NOT_FOUND, "Ticket not found")
            }
        }
    }
}

async fn search_ticket(
    State(state): State<SharedAppState>,
    QueryParams(api::ticket::SearchInput {
        ticket_id,
        phone_number,
    }): QueryParams<api::ticket::SearchInput>,
) -> Result<Json<api::ticket::Details>, SearchTicketError> {
    use SearchTicketError as E;

    let (Some(ticket_id), Some(phone_number)) = (ticket_id, phone_number)
    else {
        return Err(E::ParamsMissing);
    };
    let id = ticket_id
        .trim()
        .parse::<i32>()
        .map(api::ticket::Id::from)
        .map_err(|_| E::InvalidTicketId)?;
    let phone_number = phone_number.trim();
    if !api::ticket::is_phone_number(phone_number) {
        return Err(E::InvalidPhoneNumber);
    }

    let details = state
        .db_client
        .get_ticket_details_by_id_and_phone(id, phone_number)
        .await?
        .ok_or(E::TicketNotFound)?;

    Ok(Json(details.into()))
}

#[derive(Debug, From)]
pub enum SearchTicketError {
    #[from]
    DbError(db::Error),
    InvalidPhoneNumber,
    InvalidTicketId,
    ParamsMissing,
    TicketNotFound,
}

impl IntoResponse for SearchTicketError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => internal_error(&e),
            Self::InvalidPhoneNumber => failure(
                StatusCode::BAD_REQUEST,
                "Phone number must be 10 digits starting with 0",
            ),
            Self::InvalidTicketId => failure(
                StatusCode::BAD_REQUEST,
                "Ticket code must be a number",
            ),
            Self::ParamsMissing => failure(
                StatusCode::BAD_REQUEST,
                "Ticket code and phone number are required",
            ),
            Self::TicketNotFound => failure(
                StatusCode::NOT_FOUND,
                "No ticket matches this code and phone number",
            ),
        }
    }
}

async fn get_ticket(
    State(state): State<SharedAppState>,
    PathParam(id): PathParam<api::ticket::Id>,
) -> Result<Json<api::ticket::Details>, GetTicketError> {
    use GetTicketError as E;

    let details = state
        .db_client
        .get_ticket_details(id)
        .await?
        .ok_or(E::TicketNotFound)?;

    Ok(Json(details.into()))
}

#[derive(Debug, From)]
pub enum GetTicketError {
    #[from]
    DbError(db::Error),
    TicketNotFound,
}

impl IntoResponse for GetTicketError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => internal_error(&e),
            Self::TicketNotFound => {
                failure(StatusCode::NOT_FOUND, "Ticket not found")
            }
        }
    }
}

#[derive(Deserialize)]
struct ListTicketHistoryInput {
    #[serde(default = "default_page")]
    page: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    10
}

async fn list_ticket_history(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    QueryParams(ListTicketHistoryInput { page, limit }): QueryParams<
        ListTicketHistoryInput,
    >,
) -> Result<Json<api::ticket::List>, ListTicketHistoryError> {
    use ListTicketHistoryError as E;

    let db_client = &state.db_client;

    let my = db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;
    let owner = (!my.role.is_admin()).then_some(my.id);

    let limit = limit.clamp(1, 100);
    let offset = page.saturating_sub(1).saturating_mul(limit);

    let page_fut = db_client.get_tickets_page(owner, offset, limit);
    let total_count_fut = db_client.get_tickets_count(owner);
    let (page, total_count) = tokio::try_join!(page_fut, total_count_fut)?;

    Ok(Json(api::ticket::List {
        tickets: page.into_iter().map(Into::into).collect(),
        total_count,
    }))
}

#[derive(Debug, From)]
pub enum ListTicketHistoryError {
    #[from]
    DbError(db::Error),
    UserNotFound,
}

impl IntoResponse for ListTicketHistoryError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => internal_error(&e),
            Self::UserNotFound => {
                failure(StatusCode::UNAUTHORIZED, "User not found")
            }
        }
    }
}

async fn list_tickets_by_status(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    PathParam(status): PathParam<String>,
) -> Result<Json<Vec<api::Ticket>>, ListTicketsByStatusError> {
    use ListTicketsByStatusError as E;

    let db_client = &state.db_client;

    let my = db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;
    if !my.role.is_admin() {
        return Err(E::Forbidden);
    }
    let status = status
        .parse::<db::ticket::Status>()
        .map_err(|_| E::InvalidStatus)?;

    let tickets = db_client.get_tickets_by_status(status).await?;
    Ok(Json(tickets.into_iter().map(Into::into).collect()))
}

#[derive(Debug, From)]
pub enum ListTicketsByStatusError {
    #[from]
    DbError(db::Error),
    Forbidden,
    InvalidStatus,
    UserNotFound,
}

impl IntoResponse for ListTicketsByStatusError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => internal_error(&e),
            Self::Forbidden => failure(
                StatusCode::FORBIDDEN,
                "Only administrators can list tickets by status",
            ),
            Self::InvalidStatus => {
                failure(StatusCode::BAD_REQUEST, "Unknown ticket status")
            }
            Self::UserNotFound => {
                failure(StatusCode::UNAUTHORIZED, "User not found")
            }
        }
    }
}

async fn list_my_tickets(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<Vec<api::ticket::Details>>, ListMyTicketsError> {
    let tickets = state
        .db_client
        .get_booked_ticket_details(auth_claims.user_id)
        .await?;
    Ok(Json(tickets.into_iter().map(Into::into).collect()))
}

#[derive(Debug, From)]
pub enum ListMyTicketsError {
    #[from]
    DbError(db::Error),
}

impl IntoResponse for ListMyTicketsError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => internal_error(&e),
        }
    }
}

async fn chatbot_message(
    State(state): State<SharedAppState>,
    auth_claims: Option<AuthClaims>,
    Body(api::chatbot::MessageInput { message, user_id }): Body<
        api::chatbot::MessageInput,
    >,
) -> Result<Json<api::chatbot::Reply>, ChatbotMessageError> {
    use ChatbotMessageError as E;

    let message = message.trim();
    if message.is_empty() {
        return Err(E::MessageMissing);
    }
    let user_id = auth_claims.map(|c| c.user_id).or(user_id);

    let reply = state
        .assistant
        .reply(&state.db_client, message, user_id)
        .await?;

    Ok(Json(reply))
}

#[derive(Debug, From)]
pub enum ChatbotMessageError {
    #[from]
    DbError(db::Error),
    MessageMissing,
}

impl IntoResponse for ChatbotMessageError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => {
                tracing::error!("chatbot turn failed: {e}");
                failure(StatusCode::INTERNAL_SERVER_ERROR, "Chatbot error")
            }
            Self::MessageMissing => {
                failure(StatusCode::BAD_REQUEST, "Message is required")
            }
        }
    }
}

async fn clear_conversation_state(
    State(state): State<SharedAppState>,
    PathParam(user_id): PathParam<api::user::Id>,
) -> Result<StatusCode, ClearConversationStateError> {
    state.db_client.clear_conversation_state(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, From)]
pub enum ClearConversationStateError {
    #[from]
    DbError(db::Error),
}

impl IntoResponse for ClearConversationStateError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => internal_error(&e),
        }
    }
}

type SharedAppState = Arc<AppState>;

struct AppState {
    db_client: db::Client,

    assistant: Assistant<embedding::Client, llm::Client>,

    jwt_expiration_time: Duration,

    jwt_decoding_key: DecodingKey,

    jwt_encoding_key: EncodingKey,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct AuthClaims {
    user_id: api::user::Id,
    exp: i64,
}

#[async_trait]
impl FromRequestParts<SharedAppState> for AuthClaims {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut request::Parts,
        state: &SharedAppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AuthError::InvalidToken)?;
        let token_data = decode::<Self>(
            bearer.token(),
            &state.jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(|_| AuthError::InvalidToken)?;

        Ok(token_data.claims)
    }
}
