use axum::extract::FromRef;
use axum_template::engine::Engine;
use derive_new::new;
use tera::Tera;

use crate::database::Storage;
use crate::service::CatMeter;

pub type AppEngine = Engine<Tera>;

#[derive(Clone, FromRef, new)]
pub struct App {
    pub meter: CatMeter,
    pub engine: AppEngine,
}

pub fn create_app(storage: Storage) -> Result<App, tera::Error> {
    let engine = Engine::from(super::templates()?);
    Ok(App::new(CatMeter::new(storage), engine))
}
