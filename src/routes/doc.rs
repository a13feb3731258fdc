use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, LogoutResponse, RegisterRequest},
        requests::{
            AddServiceRequest, CartSummary, DraftLine, RequestList, ResolveOutcome,
            ResolveRequest, UpdateDetailsRequest, UpdateLineRequest,
        },
        services::{CreateServiceRequest, ServiceList, UpdateServiceRequest},
    },
    entity::{RequestStatus, Role},
    models::{LineItem, Request, RequestDetail, User, UtilityService},
    response::{ApiResponse, Meta},
    routes::{auth, health, params, requests, services},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::logout,
        auth::me,
        services::list_services,
        services::get_service,
        services::create_service,
        services::update_service,
        services::delete_service,
        services::upload_image,
        requests::list_requests,
        requests::cart_summary,
        requests::add_to_draft,
        requests::get_request,
        requests::update_details,
        requests::delete_request,
        requests::form_request,
        requests::resolve_request,
        requests::add_line,
        requests::update_line,
        requests::remove_line
    ),
    components(
        schemas(
            Role,
            RequestStatus,
            User,
            UtilityService,
            Request,
            LineItem,
            RequestDetail,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            LogoutResponse,
            CreateServiceRequest,
            UpdateServiceRequest,
            ServiceList,
            AddServiceRequest,
            UpdateLineRequest,
            UpdateDetailsRequest,
            ResolveOutcome,
            ResolveRequest,
            CartSummary,
            DraftLine,
            RequestList,
            params::ServiceQuery,
            params::RequestListQuery,
            Meta,
            ApiResponse<UtilityService>,
            ApiResponse<ServiceList>,
            ApiResponse<RequestDetail>,
            ApiResponse<RequestList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login and session revocation"),
        (name = "Services", description = "Utility service catalog"),
        (name = "Requests", description = "Billing request lifecycle"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
