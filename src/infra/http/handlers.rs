use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use commentary_api_types::{
    CommentListResponse, CommentResponse, CreateCommentRequest, CreateCommentResponse,
    ImageUpload, ListCommentsQuery, UpdateCommentRequest,
};
use uuid::Uuid;

use crate::application::comments::{CommentView, CreateCommentCommand, UpdateCommentCommand};
use crate::application::error::ErrorReport;
use crate::domain::images::ImagePayload;

use super::error::ApiError;
use super::extract::RequestUser;
use super::state::HttpState;

pub async fn create_comment(
    State(state): State<HttpState>,
    RequestUser(user_id): RequestUser,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateCommentResponse>), ApiError> {
    let Json(request) = payload?;
    let image = request.image.map(decode_image).transpose()?;

    let comment_id = state
        .comments
        .create_comment(CreateCommentCommand {
            tweet_id: request.tweet_id,
            author_id: user_id,
            text: request.text,
            image,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateCommentResponse { comment_id }),
    ))
}

pub async fn get_comment(
    State(state): State<HttpState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<CommentResponse>, ApiError> {
    let Path(id) = id?;
    let view = state.comments.get_comment(id).await?;
    Ok(Json(to_response(view)))
}

pub async fn list_tweet_comments(
    State(state): State<HttpState>,
    tweet_id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<ListCommentsQuery>, QueryRejection>,
) -> Result<Json<CommentListResponse>, ApiError> {
    let Path(tweet_id) = tweet_id?;
    let Query(query) = query?;

    let page = state
        .comments
        .list_tweet_comments(tweet_id, query.cursor.as_deref().unwrap_or_default())
        .await?;

    Ok(Json(CommentListResponse {
        cursor: page.next_cursor.clone().unwrap_or_default(),
        comments: page.map(to_response).items,
    }))
}

pub async fn update_comment(
    State(state): State<HttpState>,
    RequestUser(user_id): RequestUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateCommentRequest>, JsonRejection>,
) -> Result<Json<CommentResponse>, ApiError> {
    let Path(id) = id?;
    let Json(request) = payload?;
    let image = request.image.map(decode_image).transpose()?;

    let view = state
        .comments
        .update_comment(UpdateCommentCommand {
            comment_id: id,
            author_id: user_id,
            text: request.text,
            image,
        })
        .await?;

    Ok(Json(to_response(view)))
}

pub async fn delete_comment(
    State(state): State<HttpState>,
    RequestUser(user_id): RequestUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    state.comments.delete_comment(id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health(State(state): State<HttpState>) -> Response {
    let Some(db) = state.db.as_ref() else {
        return StatusCode::NO_CONTENT.into_response();
    };

    match db.health_check().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

fn decode_image(upload: ImageUpload) -> Result<ImagePayload, ApiError> {
    let data = STANDARD.decode(upload.data.trim()).map_err(|err| {
        ApiError::bad_request("Image data must be base64 encoded", Some(err.to_string()))
    })?;
    Ok(ImagePayload::new(
        upload.name,
        upload.content_type,
        Bytes::from(data),
    )?)
}

fn to_response(view: CommentView) -> CommentResponse {
    let CommentView { record, image_url } = view;
    CommentResponse {
        comment_id: record.id,
        tweet_id: record.tweet_id,
        user_id: record.author_id,
        text: record.text,
        image_url,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}
