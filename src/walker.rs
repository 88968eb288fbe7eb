//! Document traversal: page content streams, XObjects and annotation
//! appearances.
//!
//! For every page the walker rewrites the page's own content stream, then
//! visits image XObjects, form XObjects (recursively, own stream first)
//! and annotation appearance streams. Objects are tracked by their PDF
//! object identity, never by local resource name: the same name in two
//! resource dictionaries can point at different objects, and one object
//! can be shared under different names. The visited set spans the whole
//! run, so an XObject shared between pages is transformed exactly once; a
//! second full inversion would undo the first.
//!
//! Failures stay local. A stream that cannot be parsed keeps its original
//! bytes, an image that cannot be decoded keeps its original pixels, and
//! in both cases the surrounding page is still emitted.

use std::collections::HashSet;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::InvertError;
use crate::images;
use crate::rewrite;
use crate::{InvertMode, InvertOptions};

/// How deep Parent chains are followed before assuming a cycle.
const MAX_PARENT_DEPTH: usize = 64;

#[derive(Debug, PartialEq, Eq)]
enum XObjectKind {
    Image,
    Form,
}

pub(crate) struct Walker<'a> {
    doc: &'a mut Document,
    mode: InvertMode,
    compress: bool,
    output_dpi: u32,
    visited: HashSet<ObjectId>,
    pub streams_rewritten: usize,
    pub images_inverted: usize,
    pub images_skipped: usize,
}

impl<'a> Walker<'a> {
    pub fn new(doc: &'a mut Document, options: &InvertOptions) -> Self {
        Walker {
            doc,
            mode: options.mode,
            compress: options.compress_images,
            output_dpi: options.output_dpi,
            visited: HashSet::new(),
            streams_rewritten: 0,
            images_inverted: 0,
            images_skipped: 0,
        }
    }

    /// Process one page: content stream, images, forms, annotations.
    pub fn process_page(&mut self, page_id: ObjectId) -> Result<(), InvertError> {
        match self.rewrite_page_content(page_id) {
            Ok(true) => self.streams_rewritten += 1,
            Ok(false) => {}
            Err(e) => log::warn!("page {:?} content left unchanged: {}", page_id, e),
        }

        if let Some(resources) = page_resources(self.doc, page_id) {
            self.process_resource_images(&resources);
            self.process_resource_forms(&resources);
        }

        self.process_annotations(page_id);
        Ok(())
    }

    /// Rewrite the page's (possibly concatenated) content stream, with the
    /// background prelude in front. The rewritten content always goes into
    /// a fresh object so a stream shared between pages is never rewritten
    /// through another page's walk.
    fn rewrite_page_content(&mut self, page_id: ObjectId) -> Result<bool, InvertError> {
        let bytes = match self.doc.get_page_content(page_id) {
            Ok(b) if !b.is_empty() => b,
            _ => return Ok(false),
        };

        let mut content = Content::decode(&bytes)
            .map_err(|e| InvertError::StreamRewrite(e.to_string()))?;
        rewrite::rewrite_content(&mut content, self.mode);

        let media_box = media_box_of(self.doc, page_id);
        rewrite::prepend_background(&mut content, media_box, self.mode);

        let encoded = content
            .encode()
            .map_err(|e| InvertError::StreamRewrite(e.to_string()))?;

        let new_id = self
            .doc
            .add_object(Object::Stream(Stream::new(Dictionary::new(), encoded)));
        self.doc
            .get_object_mut(page_id)
            .and_then(|obj| obj.as_dict_mut())
            .map_err(|e| InvertError::StreamRewrite(e.to_string()))?
            .set("Contents", Object::Reference(new_id));
        Ok(true)
    }

    /// Rewrite the content of a form or appearance stream in place. No
    /// background prelude here, only pages get one.
    fn rewrite_stream_object(&mut self, id: ObjectId) -> Result<bool, InvertError> {
        let (dict, plain) = {
            let stream = self
                .doc
                .get_object(id)
                .and_then(|obj| obj.as_stream())
                .map_err(|e| InvertError::StreamRewrite(e.to_string()))?;
            let plain = stream
                .decompressed_content()
                .map_err(|e| InvertError::StreamRewrite(e.to_string()))?;
            (stream.dict.clone(), plain)
        };
        if plain.is_empty() {
            return Ok(false);
        }

        let mut content = Content::decode(&plain)
            .map_err(|e| InvertError::StreamRewrite(e.to_string()))?;
        rewrite::rewrite_content(&mut content, self.mode);

        let encoded = content
            .encode()
            .map_err(|e| InvertError::StreamRewrite(e.to_string()))?;

        let mut dict = dict;
        dict.remove(b"Filter");
        dict.remove(b"DecodeParms");
        self.doc
            .objects
            .insert(id, Object::Stream(Stream::new(dict, encoded)));
        Ok(true)
    }

    fn process_resource_images(&mut self, resources: &Dictionary) {
        if self.mode == InvertMode::TextOnly {
            return;
        }

        for (id, kind) in xobject_entries(self.doc, resources) {
            if kind != XObjectKind::Image {
                continue;
            }
            if !self.visited.insert(id) {
                continue;
            }
            match images::invert_image_xobject(self.doc, id, self.mode, self.compress, self.output_dpi)
            {
                Ok(true) => self.images_inverted += 1,
                Ok(false) => self.images_skipped += 1,
                Err(e) => {
                    log::warn!("could not invert image {:?}: {}", id, e);
                    self.images_skipped += 1;
                }
            }
        }
    }

    fn process_resource_forms(&mut self, resources: &Dictionary) {
        for (id, kind) in xobject_entries(self.doc, resources) {
            if kind != XObjectKind::Form {
                continue;
            }
            if !self.visited.insert(id) {
                continue;
            }

            // The form's own stream is rewritten before its nested
            // XObjects are visited.
            match self.rewrite_stream_object(id) {
                Ok(true) => self.streams_rewritten += 1,
                Ok(false) => {}
                Err(e) => log::warn!("form {:?} left unchanged: {}", id, e),
            }

            if let Some(nested) = stream_resources(self.doc, id) {
                self.process_resource_images(&nested);
                self.process_resource_forms(&nested);
            }
        }
    }

    fn process_annotations(&mut self, page_id: ObjectId) {
        let annot_ids: Vec<ObjectId> = {
            let page = match self.doc.get_object(page_id).and_then(|obj| obj.as_dict()) {
                Ok(d) => d,
                Err(_) => return,
            };
            let annots = match page.get(b"Annots").ok().and_then(|a| resolve(self.doc, a)) {
                Some(Object::Array(arr)) => arr,
                _ => return,
            };
            annots
                .iter()
                .filter_map(|obj| match obj {
                    Object::Reference(id) => Some(*id),
                    _ => None,
                })
                .collect()
        };

        for annot_id in annot_ids {
            let appearance = match self
                .doc
                .get_object(annot_id)
                .ok()
                .and_then(|obj| obj.as_dict().ok())
                .and_then(|dict| dict.get(b"AP").ok())
                .and_then(|ap| resolve(self.doc, ap))
            {
                Some(Object::Dictionary(d)) => d.clone(),
                _ => continue,
            };

            // Normal, rollover and down appearances.
            for key in [b"N".as_slice(), b"R".as_slice(), b"D".as_slice()] {
                if let Ok(entry) = appearance.get(key) {
                    let entry = entry.clone();
                    self.process_appearance_entry(&entry);
                }
            }
        }
    }

    /// An appearance entry is either one stream or a sub-dictionary
    /// mapping state names to streams.
    fn process_appearance_entry(&mut self, entry: &Object) {
        let mut stream_ids: Vec<ObjectId> = Vec::new();

        match entry {
            Object::Reference(id) => match self.doc.get_object(*id) {
                Ok(Object::Stream(_)) => stream_ids.push(*id),
                Ok(Object::Dictionary(states)) => {
                    stream_ids.extend(states.iter().filter_map(|(_, value)| match value {
                        Object::Reference(state_id) => Some(*state_id),
                        _ => None,
                    }));
                }
                _ => {}
            },
            Object::Dictionary(states) => {
                stream_ids.extend(states.iter().filter_map(|(_, value)| match value {
                    Object::Reference(state_id) => Some(*state_id),
                    _ => None,
                }));
            }
            _ => {}
        }

        for id in stream_ids {
            self.process_appearance_stream(id);
        }
    }

    /// An appearance stream behaves like a form: own content stream, own
    /// resources with images and nested forms.
    fn process_appearance_stream(&mut self, id: ObjectId) {
        if !self.visited.insert(id) {
            return;
        }

        match self.rewrite_stream_object(id) {
            Ok(true) => self.streams_rewritten += 1,
            Ok(false) => {}
            Err(e) => log::warn!("appearance {:?} left unchanged: {}", id, e),
        }

        if let Some(resources) = stream_resources(self.doc, id) {
            self.process_resource_images(&resources);
            self.process_resource_forms(&resources);
        }
    }
}

fn resolve<'b>(doc: &'b Document, obj: &'b Object) -> Option<&'b Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        _ => Some(obj),
    }
}

fn resolve_dict(doc: &Document, obj: &Object) -> Option<Dictionary> {
    match resolve(doc, obj) {
        Some(Object::Dictionary(d)) => Some(d.clone()),
        _ => None,
    }
}

/// Resources of a page, following the Parent chain for inherited entries.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut dict = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..MAX_PARENT_DEPTH {
        if let Ok(resources) = dict.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => {
                dict = doc.get_object(*parent_id).ok()?.as_dict().ok()?;
            }
            _ => break,
        }
    }
    None
}

/// Resources attached to a form or appearance stream.
fn stream_resources(doc: &Document, id: ObjectId) -> Option<Dictionary> {
    let stream = doc.get_object(id).ok()?.as_stream().ok()?;
    let resources = stream.dict.get(b"Resources").ok()?;
    resolve_dict(doc, resources)
}

fn as_f32(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(n) => Some(*n as f32),
        Object::Real(n) => Some(*n),
        _ => None,
    }
}

/// MediaBox of a page as `[x, y, width, height]`, following the Parent
/// chain. Falls back to US Letter when absent.
fn media_box_of(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let mut cursor = doc.get_object(page_id).ok().and_then(|obj| obj.as_dict().ok());
    for _ in 0..MAX_PARENT_DEPTH {
        let Some(dict) = cursor else { break };
        if let Some(Object::Array(arr)) = dict.get(b"MediaBox").ok().and_then(|b| resolve(doc, b)) {
            let nums: Vec<f32> = arr.iter().filter_map(as_f32).collect();
            if nums.len() == 4 {
                return [nums[0], nums[1], nums[2] - nums[0], nums[3] - nums[1]];
            }
        }
        cursor = match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => {
                doc.get_object(*parent_id).ok().and_then(|obj| obj.as_dict().ok())
            }
            _ => None,
        };
    }
    [0.0, 0.0, 612.0, 792.0]
}

/// XObject entries of a resource dictionary, classified as image or form.
fn xobject_entries(doc: &Document, resources: &Dictionary) -> Vec<(ObjectId, XObjectKind)> {
    let Some(xobjects) = resources.get(b"XObject").ok().and_then(|x| resolve_dict(doc, x))
    else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    for (_, value) in xobjects.iter() {
        let Object::Reference(id) = value else { continue };
        let Ok(Object::Stream(stream)) = doc.get_object(*id) else {
            continue;
        };
        let kind = match stream.dict.get(b"Subtype") {
            Ok(Object::Name(name)) if name == b"Image" => XObjectKind::Image,
            Ok(Object::Name(name)) if name == b"Form" => XObjectKind::Form,
            _ => continue,
        };
        entries.push((*id, kind));
    }
    entries
}
