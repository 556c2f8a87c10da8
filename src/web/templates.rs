use askama::Template;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub panel: String,
    pub busy: bool,
    pub queued: usize,
    pub slideshow: bool,
}

#[derive(Template)]
#[template(path = "converter.html")]
pub struct ConverterTemplate {
    pub panel: String,
    pub palette: bool,
    pub threshold: u8,
    pub threshold_offset: u8,
    pub saturation: String,
    pub accept: String,
}

#[derive(Template)]
#[template(path = "loader.html")]
pub struct LoaderTemplate {
    pub panel: String,
    pub width: u16,
    pub height: u16,
    pub accept: String,
}

#[derive(Template)]
#[template(path = "slideshow.html")]
pub struct SlideshowTemplate {
    pub panel: String,
    pub running: bool,
    pub images: usize,
    pub cadence_secs: u64,
}
