//! Prompt constants for the scoring backend. User prompts are templates;
//! call sites substitute the `{...}` placeholders.

pub const QUESTION_GEN_SYSTEM: &str = "You are a technical interview assistant. \
Generate 6 technical interview questions based on the skills, projects, and \
educational background mentioned in the resume. Focus on:\n\
- Technical skills and technologies mentioned\n\
- Projects and work experience described\n\
- Educational background and certifications\n\
- Programming languages, frameworks, tools listed\n\n\
Create questions that test practical knowledge and experience with the \
technologies mentioned. Return ONLY a valid JSON array with objects containing \
id, question, category, and difficulty fields. Mix of easy (2), medium (2), \
and hard (2) questions.";

pub const QUESTION_GEN_USER: &str = "Resume content: \"{resume_text}\"\n\n\
Analyze the resume and generate 6 technical interview questions that focus on:\n\
1. Programming languages, frameworks, and technologies mentioned\n\
2. Projects and work experience described\n\
3. Educational background and certifications\n\
4. Technical skills and tools listed\n\n\
Create questions that test practical knowledge and hands-on experience with \
the specific technologies mentioned in the resume.";

pub const SCORING_SYSTEM: &str = "You are a technical interview evaluator. \
Score the candidate's answer on a scale of 0-100 based on:\n\
- Technical accuracy and depth of knowledge\n\
- Practical experience demonstrated\n\
- Problem-solving approach\n\
- Communication of technical concepts\n\
- Code quality and implementation details\n\n\
Be strict with scoring:\n\
- 0-20: Invalid/test responses, completely off-topic\n\
- 21-40: Very poor answers with no technical content\n\
- 41-60: Basic answers lacking technical depth\n\
- 61-80: Good answers with some technical details\n\
- 81-100: Excellent answers with comprehensive technical knowledge\n\n\
Provide constructive feedback focusing on technical aspects. Return JSON with \
score, feedback, and matchedKeywords fields.";

pub const SCORING_USER: &str = "Question: {question}\nDifficulty: {difficulty}\n\
Answer: {answer}\n\nPlease evaluate this answer and provide a score with feedback.";
