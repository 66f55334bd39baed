//! Prompts sent to the generation backend.

/// Asks the analysis model to describe drawn-on directions in a frame.
pub const ANNOTATION_ANALYSIS_PROMPT: &str = "\
This image is a storyboard frame. The user may have drawn annotations on top of it: \
arrows, circles, scribbles, handwritten or typed text. Describe every annotation and \
the motion or change it asks for in the scene, one sentence per annotation. \
Do not describe the underlying picture. If there are no annotations, reply with exactly NONE.";

/// Asks the image model to return the frame with all annotations removed.
pub const ANNOTATION_REMOVAL_PROMPT: &str = "\
Remove every drawn annotation from this image (arrows, circles, scribbles, handwritten \
or overlaid text) and fill the covered areas so they match the surrounding scene. \
Do not change anything else. Return only the edited image.";

/// Normalize an analysis reply: `None` when the model reported no annotations.
pub fn parse_annotation_reply(reply: &str) -> Option<String> {
    let reply = reply.trim();
    if reply.is_empty() || reply.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(reply.to_string())
    }
}

/// Compose the video generation prompt.
pub fn build_video_prompt(
    custom_prompt: &str,
    global_context: &str,
    annotations: Option<&str>,
) -> String {
    let mut prompt = String::new();

    let context = global_context.trim();
    if !context.is_empty() {
        prompt.push_str("context: ");
        prompt.push_str(context);
        prompt.push('\n');
    }

    prompt.push_str("Generate a creative video based on the following input: ");
    prompt.push_str(custom_prompt.trim());
    prompt.push('\n');

    if let Some(notes) = annotations.map(str::trim).filter(|n| !n.is_empty()) {
        prompt.push_str(
            "The starting frame was annotated with these directions; follow them and do not show the annotations themselves: ",
        );
        prompt.push_str(notes);
        prompt.push('\n');
    }

    prompt
}
