use std::{
    future::{ready, Ready},
    rc::Rc,
    sync::Arc,
};

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, FromRequest, HttpMessage, HttpRequest,
};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::AppConfig;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// The caller behind a valid user token, placed in request extensions by
/// `Authentication::user`.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

/// The caller behind a valid admin token, placed in request extensions by
/// `Authentication::admin`.
#[derive(Clone, Debug)]
pub struct AuthenticatedAdmin {
    pub admin_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenScope {
    User,
    Admin,
}

/// Verifies bearer tokens for one namespace. User and admin tokens are
/// signed with different secrets, so a token only ever satisfies the scope
/// it was minted for.
pub struct Authentication {
    decoding_key: Arc<DecodingKey>,
    scope: TokenScope,
}

impl Authentication {
    pub fn user(app_config: &AppConfig) -> Self {
        Authentication {
            decoding_key: Arc::new(DecodingKey::from_secret(app_config.jwt_secret.as_ref())),
            scope: TokenScope::User,
        }
    }

    pub fn admin(app_config: &AppConfig) -> Self {
        Authentication {
            decoding_key: Arc::new(DecodingKey::from_secret(
                app_config.admin_jwt_secret.as_ref(),
            )),
            scope: TokenScope::Admin,
        }
    }
}

// Middleware factory is `Transform` trait
// `S` - type of the next service
// `B` - type of response's body
impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthenticationMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticationMiddleware {
            service: Rc::new(service),
            decoding_key: self.decoding_key.clone(),
            scope: self.scope,
        }))
    }
}

pub struct AuthenticationMiddleware<S> {
    service: Rc<S>,
    decoding_key: Arc<DecodingKey>,
    scope: TokenScope,
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Extract the JWT, validate it, and record who is calling. Handlers
        // decide whether an anonymous request is acceptable.
        let token = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim);

        match token {
            Some(token) => {
                match decode::<Claims>(token, &self.decoding_key, &Validation::default()) {
                    Ok(token_data) => {
                        let subject = token_data.claims.sub;
                        debug!("Authenticated {:?}: {}", self.scope, &subject);
                        match self.scope {
                            TokenScope::User => {
                                req.extensions_mut()
                                    .insert(AuthenticatedUser { user_id: subject });
                            }
                            TokenScope::Admin => {
                                req.extensions_mut()
                                    .insert(AuthenticatedAdmin { admin_id: subject });
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Invalid {:?} token: {:?}", self.scope, e);
                    }
                }
            }
            None => {
                debug!("No Authorization header found for {}", req.path());
            }
        };

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthenticatedUser>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("Missing or invalid bearer token".into())),
        )
    }
}

impl FromRequest for AuthenticatedAdmin {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthenticatedAdmin>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("Admin token required".into())),
        )
    }
}
