use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue};
use axum_extra::TypedHeader;
use headers::Header;

use crate::error::ApiError;
use crate::models::{AppState, CareRole};

static X_CARE_ROLE: HeaderName = HeaderName::from_static("x-care-role");
static X_CARE_USER: HeaderName = HeaderName::from_static("x-care-user");

/// `X-Care-Role: cm | pcu | scfc`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CareRoleHeader(pub CareRole);

impl Header for CareRoleHeader {
    fn name() -> &'static HeaderName {
        &X_CARE_ROLE
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        let s = value.to_str().map_err(|_| headers::Error::invalid())?;
        CareRole::parse(s)
            .map(CareRoleHeader)
            .ok_or_else(headers::Error::invalid)
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        values.extend(std::iter::once(HeaderValue::from_static(self.0.as_str())));
    }
}

/// Caller identity as declared by the front-end. Nothing here is verified.
#[derive(Debug, Clone)]
pub struct RoleContext {
    pub role: CareRole,
    pub user_name: Option<String>,
}

impl RoleContext {
    pub fn display_name(&self) -> String {
        self.user_name
            .clone()
            .unwrap_or_else(|| self.role.as_str().to_uppercase())
    }
}

impl FromRequestParts<AppState> for RoleContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let TypedHeader(CareRoleHeader(role)) =
                TypedHeader::<CareRoleHeader>::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::role_required())?;

            // may carry raw UTF-8 (Thai names), so no to_str()
            let user_name = parts
                .headers
                .get(&X_CARE_USER)
                .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());

            Ok(RoleContext { role, user_name })
        }
    }
}
