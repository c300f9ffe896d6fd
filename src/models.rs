use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct RegisterReq {
    #[schema(example = "asha@ace.edu", format = "email")]
    pub email: String,
    pub password: String,
    #[schema(example = "Asha Verma")]
    pub name: String,
    /// `student` or `teacher`
    #[schema(example = "student")]
    pub role: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "asha@ace.edu", format = "email")]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// email
    pub sub: String,
    pub name: String,
    pub role: u8, // role id
    pub exp: usize,
    pub jti: String,
}
