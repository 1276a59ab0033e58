use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};

/// Extracts the shared secret from the `X-Wacht-Secret` header and checks it
/// against the aggregator's configured secret.
pub struct SharedSecret;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SharedSecret {
    type Error = &'static str;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let configured: &rocket::State<String> = match request.guard().await {
            Outcome::Success(s) => s,
            _ => return Outcome::Error((Status::InternalServerError, "secret not configured")),
        };

        match request.headers().get_one("X-Wacht-Secret") {
            Some(got) if got == configured.as_str() => Outcome::Success(SharedSecret),
            _ => Outcome::Error((Status::Unauthorized, "missing or invalid X-Wacht-Secret")),
        }
    }
}
