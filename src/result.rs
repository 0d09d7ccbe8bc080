use serde::Serialize;

/// Success envelope. `payload` is flattened into the top-level object, so a
/// `Data` payload renders as `{success, data}` while a plain struct renders the
/// legacy flat shape `{success, ...fields}`.
#[derive(Serialize)]
pub struct ApiResult<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub payload: T,
}

#[derive(Serialize)]
pub struct Data<T: Serialize> {
    pub data: T,
}

#[derive(Serialize)]
pub struct Empty {}

impl<T: Serialize> ApiResult<Data<T>> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            payload: Data { data },
        }
    }
}

impl<T: Serialize> ApiResult<T> {
    pub fn flat(payload: T) -> Self {
        Self {
            success: true,
            payload,
        }
    }
}

impl ApiResult<Empty> {
    pub fn ok() -> Self {
        Self::flat(Empty {})
    }
}
