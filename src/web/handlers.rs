//! Route handlers.
//!
//! GET on a form route returns a descriptor of the form; POST takes an
//! urlencoded body. Every body carries a `notice`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ApiResult, Notice};
use super::extract::ValidForm;
use super::{session_token, AppState, SharedState};
use crate::application::{AdminDashboard, PatientRemoval};
use crate::domain::{
    DoctorSummary, Identity, LiverFeatures, PredictionRecord, Role, FEATURE_FIELDS,
};

/// Response body: a notice plus a view-specific payload.
#[derive(Debug, Serialize)]
pub struct Reply<T: Serialize> {
    pub notice: Notice,
    #[serde(flatten)]
    pub body: T,
}

impl<T: Serialize> Reply<T> {
    fn new(notice: Notice, body: T) -> Json<Self> {
        Json(Self { notice, body })
    }
}

#[derive(Debug, Serialize)]
pub struct NoticeOnly {
    pub notice: Notice,
}

fn notice_only(notice: Notice) -> Json<NoticeOnly> {
    Json(NoticeOnly { notice })
}

#[derive(Debug, Serialize)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct FormDescriptor {
    pub form: &'static str,
    pub method: &'static str,
    pub action: &'static str,
    pub fields: Vec<FieldDescriptor>,
}

fn descriptor(
    form: &'static str,
    action: &'static str,
    fields: &[(&'static str, &'static str)],
) -> FormDescriptor {
    FormDescriptor {
        form,
        method: "POST",
        action,
        fields: fields
            .iter()
            .map(|&(name, kind)| FieldDescriptor { name, kind })
            .collect(),
    }
}

#[derive(Debug, Serialize)]
pub struct Landing {
    pub service: &'static str,
    pub model: String,
    pub identity: Identity,
    pub routes: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct LoginReply {
    pub session_token: String,
    pub identity: Identity,
}

#[derive(Debug, Serialize)]
pub struct ScreeningForm {
    pub patient_name: String,
    #[serde(flatten)]
    pub descriptor: FormDescriptor,
}

#[derive(Debug, Serialize)]
pub struct ScreeningReply {
    pub prediction: u8,
    pub message: &'static str,
    pub features: LiverFeatures,
    pub record: PredictionRecord,
}

#[derive(Debug, Serialize)]
pub struct DoctorDashboard {
    pub doctor_name: String,
    pub records: Vec<PredictionRecord>,
}

#[derive(Debug, Serialize)]
pub struct DoctorCreated {
    pub doctor: DoctorSummary,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub name: String,
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PatientLoginForm {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AdminLoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DoctorForm {
    pub doctor_id: String,
    pub name: String,
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DoctorLoginForm {
    pub doctor_id: String,
    pub password: String,
}

const CREDENTIAL_FIELDS: [(&str, &str); 2] = [("phone", "text"), ("password", "password")];

/// Run account work on the blocking pool. Password hashing and
/// verification take long enough to stall an async worker.
async fn blocking<T, F>(state: &SharedState, work: F) -> crate::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> crate::Result<T> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || work(&state)).await?
}

fn login(
    state: &SharedState,
    headers: &HeaderMap,
    identity: Identity,
    notice: Notice,
) -> ApiResult<Json<Reply<LoginReply>>> {
    let session_token = state
        .sessions
        .establish(identity.clone(), session_token(headers))?;
    Ok(Reply::new(
        notice,
        LoginReply {
            session_token,
            identity,
        },
    ))
}

fn logout(
    state: &SharedState,
    headers: &HeaderMap,
    role: Role,
    message: &str,
) -> ApiResult<Json<NoticeOnly>> {
    if state.sessions.terminate(session_token(headers), role)? {
        tracing::info!(%role, "Session closed");
    }
    Ok(notice_only(Notice::info(message).redirect("/")))
}

pub async fn home(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<Reply<Landing>>> {
    let identity = state.sessions.current(session_token(&headers))?;
    Ok(Reply::new(
        Notice::info("Liver disease screening"),
        Landing {
            service: "hepascreen",
            model: state.screening.model_status(),
            identity,
            routes: super::ROUTES.to_vec(),
        },
    ))
}

pub async fn register_form() -> Json<Reply<FormDescriptor>> {
    Reply::new(
        Notice::info("Create a patient account"),
        descriptor(
            "register",
            "/register",
            &[("name", "text"), ("phone", "text"), ("password", "password")],
        ),
    )
}

pub async fn register(
    State(state): State<SharedState>,
    ValidForm(form): ValidForm<RegisterForm>,
) -> ApiResult<(StatusCode, Json<NoticeOnly>)> {
    blocking(&state, move |app| {
        app.accounts
            .register_patient(&form.phone, &form.name, &form.password)
    })
    .await
    .map_err(|e| ApiError::from(e).or_redirect("/register"))?;
    Ok((
        StatusCode::CREATED,
        notice_only(Notice::success("Registered successfully! Please login.").redirect("/login")),
    ))
}

pub async fn login_form() -> Json<Reply<FormDescriptor>> {
    Reply::new(
        Notice::info("Patient login"),
        descriptor("login", "/login", &CREDENTIAL_FIELDS),
    )
}

pub async fn patient_login(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ValidForm(form): ValidForm<PatientLoginForm>,
) -> ApiResult<Json<Reply<LoginReply>>> {
    let identity = blocking(&state, move |app| {
        app.accounts.verify_patient(&form.phone, &form.password)
    })
    .await
    .map_err(|e| ApiError::from(e).or_redirect("/login"))?;
    login(
        &state,
        &headers,
        identity,
        Notice::success("Logged in successfully!").redirect("/form"),
    )
}

pub async fn patient_logout(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<NoticeOnly>> {
    logout(&state, &headers, Role::Patient, "Logged out")
}

pub async fn screening_form(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<Reply<ScreeningForm>>> {
    let identity = state
        .sessions
        .require(session_token(&headers), Role::Patient)?;
    let fields: Vec<(&'static str, &'static str)> =
        FEATURE_FIELDS.iter().map(|&name| (name, "number")).collect();
    Ok(Reply::new(
        Notice::info("Enter your lab values"),
        ScreeningForm {
            patient_name: identity.display_name().to_string(),
            descriptor: descriptor("form", "/form", &fields),
        },
    ))
}

pub async fn submit_screening(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ValidForm(form): ValidForm<HashMap<String, String>>,
) -> ApiResult<Json<Reply<ScreeningReply>>> {
    let identity = state
        .sessions
        .require(session_token(&headers), Role::Patient)?;
    let outcome = state
        .screening
        .submit(&identity, &form)
        .map_err(|e| ApiError::from(e).or_redirect("/form"))?;

    Ok(Reply::new(
        Notice::success("Prediction complete"),
        ScreeningReply {
            prediction: outcome.label.as_u8(),
            message: outcome.label.message(),
            features: outcome.record.features,
            record: outcome.record,
        },
    ))
}

pub async fn admin_login_form() -> Json<Reply<FormDescriptor>> {
    Reply::new(
        Notice::info("Administrator login"),
        descriptor(
            "admin-login",
            "/admin-login",
            &[("username", "text"), ("password", "password")],
        ),
    )
}

pub async fn admin_login(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ValidForm(form): ValidForm<AdminLoginForm>,
) -> ApiResult<Json<Reply<LoginReply>>> {
    let identity = blocking(&state, move |app| {
        app.accounts.verify_admin(&form.username, &form.password)
    })
    .await
    .map_err(|e| ApiError::from(e).or_redirect("/admin-login"))?;
    login(
        &state,
        &headers,
        identity,
        Notice::success("Admin logged in successfully!").redirect("/admin-dashboard"),
    )
}

pub async fn admin_dashboard(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<Reply<AdminDashboard>>> {
    state
        .sessions
        .require(session_token(&headers), Role::Admin)?;
    let dashboard = state.accounts.admin_dashboard()?;
    Ok(Reply::new(Notice::info("Admin dashboard"), dashboard))
}

pub async fn admin_logout(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<NoticeOnly>> {
    logout(&state, &headers, Role::Admin, "Admin logged out")
}

pub async fn add_doctor_form(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<Reply<FormDescriptor>>> {
    state
        .sessions
        .require(session_token(&headers), Role::Admin)?;
    Ok(Reply::new(
        Notice::info("Add a doctor"),
        descriptor(
            "add_doctor",
            "/admin/add_doctor",
            &[
                ("doctor_id", "text"),
                ("name", "text"),
                ("phone", "text"),
                ("password", "password"),
            ],
        ),
    ))
}

pub async fn add_doctor(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ValidForm(form): ValidForm<DoctorForm>,
) -> ApiResult<(StatusCode, Json<Reply<DoctorCreated>>)> {
    state
        .sessions
        .require(session_token(&headers), Role::Admin)?;
    let doctor = blocking(&state, move |app| {
        app.accounts
            .add_doctor(&form.doctor_id, &form.name, &form.phone, &form.password)
    })
    .await
    .map_err(|e| ApiError::from(e).or_redirect("/admin/add_doctor"))?;

    let notice = Notice::success(format!("Doctor {} added successfully!", doctor.name))
        .redirect("/admin-dashboard");
    Ok((StatusCode::CREATED, Reply::new(notice, DoctorCreated { doctor })))
}

pub async fn delete_patient(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(phone): Path<String>,
) -> ApiResult<Json<Reply<PatientRemoval>>> {
    state
        .sessions
        .require(session_token(&headers), Role::Admin)?;
    let removal = state.accounts.delete_patient(&phone)?;
    let revoked = state.sessions.revoke_patient(&phone)?;
    if revoked > 0 {
        tracing::info!(revoked, "Closed sessions of deleted patient");
    }
    Ok(Reply::new(
        Notice::success("Patient deleted successfully").redirect("/admin-dashboard"),
        removal,
    ))
}

pub async fn doctor_login_form() -> Json<Reply<FormDescriptor>> {
    Reply::new(
        Notice::info("Doctor login"),
        descriptor(
            "doctor-login",
            "/doctor-login",
            &[("doctor_id", "text"), ("password", "password")],
        ),
    )
}

pub async fn doctor_login(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ValidForm(form): ValidForm<DoctorLoginForm>,
) -> ApiResult<Json<Reply<LoginReply>>> {
    let identity = blocking(&state, move |app| {
        app.accounts.verify_doctor(&form.doctor_id, &form.password)
    })
    .await
    .map_err(|e| ApiError::from(e).or_redirect("/doctor-login"))?;
    let welcome = format!("Welcome Dr. {}", identity.display_name());
    login(
        &state,
        &headers,
        identity,
        Notice::success(welcome).redirect("/doctor-dashboard"),
    )
}

pub async fn doctor_dashboard(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<Reply<DoctorDashboard>>> {
    let identity = state
        .sessions
        .require(session_token(&headers), Role::Doctor)?;
    let records = state.accounts.all_records()?;
    Ok(Reply::new(
        Notice::info("Doctor dashboard"),
        DoctorDashboard {
            doctor_name: identity.display_name().to_string(),
            records,
        },
    ))
}

pub async fn doctor_logout(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<NoticeOnly>> {
    logout(&state, &headers, Role::Doctor, "Doctor logged out")
}
