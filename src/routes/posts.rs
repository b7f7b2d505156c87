use axum::extract::{FromRequest, Multipart, Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::gate;
use crate::auth::Identity;
use crate::blobs::ImageUpload;
use crate::error::{AppError, AppResult};
use crate::extractors::JsonBody;
use crate::posts::{Comment, NewPost, Post, PostPatch};
use crate::state::AppState;

// --- Request bodies ---

#[derive(Debug, Default, Deserialize)]
pub struct PostInput {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentInput {
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeCount {
    pub likes: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Confirmation {
    pub message: String,
}

/// Body of `POST /posts`: JSON, or multipart with an optional `image` file part.
pub struct NewPostForm {
    pub input: PostInput,
    pub image: Option<ImageUpload>,
}

impl FromRequest<AppState> for NewPostForm {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !is_multipart {
            let JsonBody(input) = JsonBody::<PostInput>::from_request(req, state).await?;
            return Ok(Self { input, image: None });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;

        let mut input = PostInput::default();
        let mut image = None;
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "title" => input.title = Some(field.text().await?),
                "content" => input.content = Some(field.text().await?),
                "image" => {
                    let file_name = field.file_name().map(str::to_string);
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await?;
                    // browsers send an empty part when no file was chosen
                    if !data.is_empty() {
                        image = Some(ImageUpload {
                            file_name,
                            content_type,
                            data,
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(Self { input, image })
    }
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/search", get(search_posts))
        .route("/posts/mine", get(my_posts))
        .route(
            "/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/posts/{id}/like", post(like_post))
        .route("/posts/{id}/comment", post(comment_on_post))
}

// --- Handlers ---

async fn create_post(
    State(state): State<AppState>,
    identity: Identity,
    form: NewPostForm,
) -> AppResult<(StatusCode, Json<Post>)> {
    let NewPostForm { input, image } = form;
    let mut new_post = NewPost::new(input.title, input.content, identity.username);

    // Reject before touching the blob store so bad requests leave no orphaned images.
    new_post.validate()?;
    if let Some(upload) = image {
        new_post.image_url = Some(state.blobs.put_image(upload).await?);
    }

    let post = state.posts.create(new_post).await?;
    tracing::info!(post_id = %post.id, author = %post.author, "Post created");
    Ok((StatusCode::CREATED, Json(post)))
}

async fn list_posts(State(state): State<AppState>) -> AppResult<Json<Vec<Post>>> {
    Ok(Json(state.posts.list_all().await?))
}

async fn search_posts(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<Post>>> {
    let query = params.query.unwrap_or_default();
    Ok(Json(state.posts.search(&query).await?))
}

async fn my_posts(
    State(state): State<AppState>,
    identity: Identity,
) -> AppResult<Json<Vec<Post>>> {
    Ok(Json(state.posts.list_by_author(&identity.username).await?))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Post>> {
    Ok(Json(state.posts.get_by_id(&id).await?))
}

async fn update_post(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<PostInput>,
) -> AppResult<Json<Post>> {
    let patch = PostPatch {
        title: input.title,
        content: input.content,
    }
    .normalized()?;

    gate::require_author(state.posts.as_ref(), &id, &identity).await?;
    let post = state.posts.update(&id, patch).await?;
    tracing::info!(post_id = %post.id, "Post updated");
    Ok(Json(post))
}

async fn delete_post(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> AppResult<Json<Confirmation>> {
    gate::require_author(state.posts.as_ref(), &id, &identity).await?;
    state.posts.delete(&id).await?;
    tracing::info!(post_id = %id, "Post deleted");
    Ok(Json(Confirmation {
        message: "Post deleted successfully".into(),
    }))
}

async fn like_post(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> AppResult<Json<LikeCount>> {
    let likes = state.posts.increment_likes(&id, &identity.username).await?;
    Ok(Json(LikeCount { likes }))
}

async fn comment_on_post(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<CommentInput>,
) -> AppResult<Json<Vec<Comment>>> {
    let text = input.comment.unwrap_or_default();
    let comments = state
        .posts
        .append_comment(&id, &identity.username, &text)
        .await?;
    Ok(Json(comments))
}
