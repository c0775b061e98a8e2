use chrono::TimeDelta;

use crate::form::{AnnotationForm, FormError, Submission};
use crate::map_host::{DrawControl, MapEvent, MapHost};
use crate::record::{AnnotationRecord, LatLng, RecordError, ShapeId};
use crate::storage::KeyValueStorage;
use crate::store::{AnnotationStore, StoreError};
use crate::tooltip::{self, Locale, TooltipOptions};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub control: DrawControl,
    pub locale: Locale,
    pub expiry: TimeDelta,
}

/// Result of saving the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub submission: Submission,
    /// Whether a stored record was found for the shape.
    pub matched: bool,
}

/// Annotation state for as long as it is mounted on a map.
pub struct AnnotationSession<S> {
    store: AnnotationStore<S>,
    form: AnnotationForm,
    settings: SessionSettings,
}

impl<S: KeyValueStorage> AnnotationSession<S> {
    /// Loads saved shapes, draws them and starts listening for new ones.
    pub fn mount<M: MapHost + ?Sized>(storage: S, map: &mut M, settings: SessionSettings) -> Self {
        let store = AnnotationStore::load(storage, settings.expiry);
        store.restore_all(map, settings.control.shape, settings.locale);
        map.add_draw_control(settings.control);
        Self {
            store,
            form: AnnotationForm::new(),
            settings,
        }
    }

    /// Stops listening for draw events and hands the storage back.
    pub fn unmount<M: MapHost + ?Sized>(self, map: &mut M) -> S {
        map.remove_draw_control();
        self.store.into_storage()
    }

    pub fn store(&self) -> &AnnotationStore<S> {
        &self.store
    }

    #[cfg(test)]
    pub fn store_mut(&mut self) -> &mut AnnotationStore<S> {
        &mut self.store
    }

    pub fn form(&self) -> &AnnotationForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut AnnotationForm {
        &mut self.form
    }

    pub fn locale(&self) -> Locale {
        self.settings.locale
    }

    pub fn handle_event<M: MapHost + ?Sized>(
        &mut self,
        map: &mut M,
        event: MapEvent,
    ) -> Result<ShapeId, SessionError> {
        match event {
            MapEvent::ShapeCreated { vertices } => self.on_shape_created(map, vertices),
        }
    }

    fn on_shape_created<M: MapHost + ?Sized>(
        &mut self,
        map: &mut M,
        vertices: Vec<LatLng>,
    ) -> Result<ShapeId, SessionError> {
        let id = ShapeId::new();
        let record = AnnotationRecord::new(id, vertices)?;
        map.add_polygon(id, record.coordinates(), self.settings.control.shape);
        tracing::info!(%id, "shape drawn");
        self.form.begin(id);
        self.store.append(record)?;
        Ok(id)
    }

    /// Deletes every annotation and its shape.
    pub fn clear_all<M: MapHost + ?Sized>(&mut self, map: &mut M) -> Result<(), SessionError> {
        self.form.reset();
        map.clear_polygons();
        self.store.clear()?;
        Ok(())
    }

    /// Saves the form into the selected shape's record and retitles the shape.
    pub fn submit<M: MapHost + ?Sized>(&mut self, map: &mut M) -> Result<SubmitOutcome, SessionError> {
        let submission = self.form.submit()?;
        let Submission { shape, count, action } = submission;

        let ring = map
            .polygon_ring(shape)
            .or_else(|| self.store.get(shape).map(|r| r.coordinates().to_vec()))
            .unwrap_or_default();
        map.bind_tooltip(
            shape,
            tooltip::label(count, action, &ring, self.settings.locale),
            TooltipOptions::default(),
        );

        let matched = self.store.update_matching(shape, count, action)?;
        Ok(SubmitOutcome { submission, matched })
    }
}
